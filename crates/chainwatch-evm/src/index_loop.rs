//! The address index loop.
//!
//! # Bootstrap
//! A fresh ledger (checkpoint 0) is pinned to the current chain head; history
//! before startup is never scanned. A ledger with a checkpoint resumes from it.
//! Failure here is fatal.
//!
//! # Cycles
//! Every `poll_interval_ms`:
//!   - Fetch head `H`, read checkpoint `C`; stop if `H <= C`
//!   - Snapshot the subscribed addresses
//!   - Open one write scope and walk blocks `C+1..=H` in order,
//!     staging every matching transaction and the per-block checkpoint
//!   - Commit once at the end
//!
//! Any failure rolls the whole cycle back; the next tick retries from `C`.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Span;

use chainwatch_core::client::ChainClient;
use chainwatch_core::config::IngestConfig;
use chainwatch_core::error::WatchError;
use chainwatch_core::ledger::{AddressLedger, WriteScope};

/// Result of a single catch-up cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Head was not ahead of the checkpoint; nothing was written.
    UpToDate { checkpoint: u64 },
    /// Blocks `from..=to` were ingested and committed.
    Committed { from: u64, to: u64, appended: usize },
}

/// Polls the chain and appends subscribed addresses' transactions to the ledger.
pub struct IndexLoop<C> {
    client: C,
    ledger: Arc<dyn AddressLedger>,
    config: IngestConfig,
    span: Span,
}

impl<C: ChainClient> IndexLoop<C> {
    pub fn new(
        client: C,
        ledger: Arc<dyn AddressLedger>,
        config: IngestConfig,
        span: Span,
    ) -> Self {
        Self {
            client,
            ledger,
            config,
            span,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn AddressLedger> {
        &self.ledger
    }

    /// Bound a chain read by `request_timeout_ms`.
    async fn chain_call<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, WatchError>>,
    ) -> Result<T, WatchError> {
        match tokio::time::timeout(self.config.request_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(WatchError::Unavailable(format!(
                "{what} timed out after {}ms",
                self.config.request_timeout_ms
            ))),
        }
    }

    /// Establish the starting checkpoint. Returns the checkpoint in effect.
    pub async fn bootstrap(&self) -> Result<u64, WatchError> {
        let existing = self.ledger.checkpoint().await?;
        if existing > 0 {
            tracing::info!(parent: &self.span, checkpoint = existing, "Resuming from checkpoint");
            return Ok(existing);
        }

        let head = self
            .chain_call("current_height", self.client.current_height())
            .await?;
        let mut scope = self.ledger.begin_write().await?;
        scope.set_checkpoint(head);
        let checkpoint = scope.commit().await?;
        tracing::info!(parent: &self.span, checkpoint, "Checkpoint bootstrapped to chain head");
        Ok(checkpoint)
    }

    /// Run one catch-up cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, WatchError> {
        let head = self
            .chain_call("current_height", self.client.current_height())
            .await?;
        let checkpoint = self.ledger.checkpoint().await?;
        if head <= checkpoint {
            tracing::debug!(parent: &self.span, head, checkpoint, "No new blocks");
            return Ok(CycleOutcome::UpToDate { checkpoint });
        }

        let addresses: HashSet<String> = self.ledger.list_addresses().await?.into_iter().collect();
        let from = checkpoint + 1;

        let mut scope = self.ledger.begin_write().await?;
        match self.ingest(scope.as_mut(), &addresses, from, head).await {
            Ok(appended) => {
                let to = scope.commit().await?;
                tracing::info!(
                    parent: &self.span,
                    from,
                    to,
                    appended,
                    addresses = addresses.len(),
                    "Cycle committed"
                );
                Ok(CycleOutcome::Committed { from, to, appended })
            }
            Err(e) => {
                scope.rollback().await;
                Err(e)
            }
        }
    }

    async fn ingest(
        &self,
        scope: &mut dyn WriteScope,
        addresses: &HashSet<String>,
        from: u64,
        to: u64,
    ) -> Result<usize, WatchError> {
        let mut appended = 0;
        for number in from..=to {
            let block = self
                .chain_call("block_by_number", self.client.block_by_number(number))
                .await?;

            let mut matched = 0;
            for tx in &block.transactions {
                for participant in tx.participants() {
                    if addresses.contains(&participant) {
                        scope.append(&participant, number, tx.clone())?;
                        matched += 1;
                    }
                }
            }
            scope.set_checkpoint(number);
            appended += matched;

            tracing::debug!(
                parent: &self.span,
                block = number,
                txs = block.transactions.len(),
                matched,
                "Block staged"
            );
        }
        Ok(appended)
    }

    /// Bootstrap, then run a cycle every `poll_interval_ms` until `cancel` fires.
    ///
    /// Only a bootstrap failure ends the loop with an error; cycle failures are
    /// logged and retried on the next tick. A cycle in flight when `cancel`
    /// fires is dropped, which discards its write scope. A zero interval in
    /// the config is rejected before bootstrap.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), WatchError> {
        if let Err(e) = self.config.validate() {
            tracing::error!(parent: &self.span, error = %e, "Invalid ingest config");
            return Err(e);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(parent: &self.span, "Index loop cancelled before bootstrap");
                return Ok(());
            }
            result = self.bootstrap() => {
                if let Err(e) = result {
                    tracing::error!(parent: &self.span, error = %e, "Bootstrap failed");
                    return Err(e);
                }
            }
        }

        let period = self.config.poll_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(parent: &self.span, "Cancelled mid-cycle, write scope discarded");
                    break;
                }
                result = self.run_cycle() => {
                    if let Err(e) = result {
                        tracing::error!(
                            parent: &self.span,
                            error = %e,
                            retryable = e.is_retryable(),
                            "Cycle failed, retrying next tick"
                        );
                    }
                }
            }
        }

        tracing::info!(parent: &self.span, "Index loop stopped");
        Ok(())
    }
}
