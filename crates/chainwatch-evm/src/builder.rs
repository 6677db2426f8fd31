//! Fluent builder API for creating index loops.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainwatch_evm::{EthChainClient, WatcherBuilder};
//! use chainwatch_rpc::HttpRpcClient;
//! use chainwatch_storage::InMemoryLedger;
//!
//! let transport = HttpRpcClient::default_for("https://ethereum-rpc.publicnode.com").unwrap();
//! let watcher = WatcherBuilder::new()
//!     .poll_interval_ms(12_000)
//!     .request_timeout_ms(5_000)
//!     .build(EthChainClient::new(transport), Arc::new(InMemoryLedger::new()));
//! ```

use std::sync::Arc;

use tracing::Span;

use chainwatch_core::client::ChainClient;
use chainwatch_core::config::IngestConfig;
use chainwatch_core::ledger::AddressLedger;

use crate::index_loop::IndexLoop;

/// Fluent builder for [`IndexLoop`].
#[derive(Default)]
pub struct WatcherBuilder {
    config: IngestConfig,
    span: Option<Span>,
}

impl WatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole ingestion config.
    pub fn config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the interval between cycles in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the timeout applied to each chain read in milliseconds.
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    /// Log through `span` instead of a fresh `index_loop` span.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Build the config without a client.
    pub fn build_config(self) -> IngestConfig {
        self.config
    }

    pub fn build<C: ChainClient>(self, client: C, ledger: Arc<dyn AddressLedger>) -> IndexLoop<C> {
        let span = self
            .span
            .unwrap_or_else(|| tracing::info_span!("index_loop"));
        IndexLoop::new(client, ledger, self.config, span)
    }
}
