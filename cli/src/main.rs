//! chainwatch: watch Ethereum addresses and serve their transactions over HTTP.
//!
//! # Commands
//! ```text
//! chainwatch [run]  --config ./config.json [--rpc-url <url>] [--listen <ip:port>]
//! chainwatch info   --config ./config.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use chainwatch_api::LedgerFacade;
use chainwatch_evm::{EthChainClient, WatcherBuilder};
use chainwatch_rpc::HttpRpcClient;
use chainwatch_storage::InMemoryLedger;

mod config;
mod logging;

use config::AppConfig;

#[derive(Parser)]
#[command(
    name = "chainwatch",
    about = "Watch Ethereum addresses and serve their transactions",
    long_about = "
ChainWatch follows the Ethereum chain head, records every transaction sent from
or to a subscribed address, and serves them over HTTP.

ENVIRONMENT VARIABLES:
  CHAINWATCH_RPC_URL   JSON-RPC endpoint (overrides rpc.url)
  CHAINWATCH_LISTEN    HTTP listen address ip:port (overrides http.server)
  RUST_LOG             Log filter (overrides log.level)
",
    version
)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, global = true, default_value = "./config.json")]
    config: PathBuf,

    /// Ethereum JSON-RPC endpoint
    #[arg(long, global = true, env = "CHAINWATCH_RPC_URL")]
    rpc_url: Option<String>,

    /// HTTP listen address (ip:port)
    #[arg(long, global = true, env = "CHAINWATCH_LISTEN")]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion loop and the HTTP API (default)
    Run,
    /// Print the effective configuration
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    config.apply_overrides(cli.rpc_url, cli.listen)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Info => cmd_info(&config),
        Commands::Run => cmd_run(config).await,
    }
}

fn cmd_info(config: &AppConfig) -> Result<()> {
    println!("ChainWatch v{}", env!("CARGO_PKG_VERSION"));
    println!("  Chain process interval: {} ms", config.chain_process_interval);
    println!("  RPC endpoint: {} (timeout {} ms)", config.rpc.url, config.rpc.timeout_ms);
    println!("  Chain call budget: {} ms", config.ingest().request_timeout_ms);
    println!("  HTTP listen: {}", config.http.server.listen_addr());
    println!("  Seeded addresses: {}", config.seed.len());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

async fn cmd_run(config: AppConfig) -> Result<()> {
    logging::init_logging(&config.log)?;
    let root = tracing::info_span!("chainwatch", version = %config.version);

    let ledger = Arc::new(InMemoryLedger::with_span(
        tracing::info_span!(parent: &root, "ledger"),
    ));
    for entry in &config.seed {
        ledger
            .seed(&entry.address, entry.transactions.clone())
            .with_context(|| format!("failed to seed {}", entry.address))?;
    }

    let transport = HttpRpcClient::new(config.rpc.url.clone(), config.http_client())
        .context("failed to create RPC client")?;
    let client = EthChainClient::with_span(
        transport,
        tracing::info_span!(parent: &root, "eth_client"),
    );

    let watcher = WatcherBuilder::new()
        .config(config.ingest())
        .span(tracing::info_span!(parent: &root, "index_loop"))
        .build(client, ledger.clone());

    let api_span = tracing::info_span!(parent: &root, "api");
    let facade = Arc::new(LedgerFacade::new(ledger, api_span.clone()));

    let listen = config.http.server.listen_addr();
    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone(), root.clone()));

    let index_task = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let result = watcher.run(cancel.clone()).await;
            if result.is_err() {
                cancel.cancel();
            }
            result
        }
    });

    let served = chainwatch_api::serve(listener, facade, api_span, cancel.clone()).await;
    cancel.cancel();
    tracing::info!(parent: &root, "Shutting down");

    let indexed = index_task.await.context("index loop task panicked")?;
    served.context("HTTP server failed")?;
    indexed.context("index loop failed")?;
    tracing::info!(parent: &root, "Stopped");
    Ok(())
}

/// Cancel `cancel` on SIGINT or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken, span: Span) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(parent: &span, error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(parent: &span, error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => return,
    }

    tracing::info!(parent: &span, "Shutdown signal received");
    cancel.cancel();
}
