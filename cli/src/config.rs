//! Service configuration file.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use chainwatch_core::config::IngestConfig;
use chainwatch_core::types::Transaction;
use chainwatch_rpc::{HttpClientConfig, DEFAULT_ETHEREUM_RPC_URL};

/// Top-level `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Milliseconds between ingestion cycles.
    pub chain_process_interval: u64,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Addresses (and history) loaded into the ledger at startup.
    #[serde(default)]
    pub seed: Vec<SeedEntry>,
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,
    #[serde(default = "default_rpc_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_rpc_url() -> String {
    DEFAULT_ETHEREUM_RPC_URL.to_string()
}

fn default_rpc_timeout_ms() -> u64 {
    5_000
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            timeout_ms: default_rpc_timeout_ms(),
        }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Append logs here; stderr when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// "trace" | "debug" | "info" | "warn" | "error", or any `EnvFilter` directive.
    #[serde(default = "default_level")]
    pub level: String,
    /// Force JSON (true) or text (false). Unset: text for debug, JSON otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: default_level(),
            json: None,
        }
    }
}

impl LogConfig {
    pub fn use_json(&self) -> bool {
        self.json
            .unwrap_or_else(|| !self.level.eq_ignore_ascii_case("debug"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_ip")]
    pub ip_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip_address: default_ip(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.ip_address, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEntry {
    pub address: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl AppConfig {
    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.chain_process_interval > 0,
            "chainProcessInterval must be greater than 0"
        );
        ensure!(self.rpc.timeout_ms > 0, "rpc.timeoutMs must be greater than 0");
        ensure!(!self.rpc.url.trim().is_empty(), "rpc.url must not be empty");
        Ok(())
    }

    /// Apply command-line / environment overrides.
    pub fn apply_overrides(&mut self, rpc_url: Option<String>, listen: Option<String>) -> Result<()> {
        if let Some(url) = rpc_url {
            self.rpc.url = url;
        }
        if let Some(listen) = listen {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("invalid listen address {listen:?}"))?;
            self.http.server.ip_address = addr.ip().to_string();
            self.http.server.port = addr.port();
        }
        self.validate()
    }

    /// Transport settings: `rpc.timeoutMs` bounds each HTTP attempt.
    pub fn http_client(&self) -> HttpClientConfig {
        HttpClientConfig {
            request_timeout: self.rpc.timeout(),
            ..Default::default()
        }
    }

    /// Loop settings: each chain call may spend the transport's whole retry budget.
    pub fn ingest(&self) -> IngestConfig {
        IngestConfig {
            poll_interval_ms: self.chain_process_interval,
            request_timeout_ms: self.http_client().call_budget().as_millis() as u64,
        }
    }
}
