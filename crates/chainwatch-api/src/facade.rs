//! The query façade.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Span;

use chainwatch_core::error::WatchError;
use chainwatch_core::ledger::AddressLedger;
use chainwatch_core::types::Transaction;

/// Operations exposed to callers outside the pipeline.
#[async_trait]
pub trait QueryFacade: Send + Sync {
    /// The last fully ingested block (the ledger checkpoint).
    async fn current_block(&self) -> Result<u64, WatchError>;

    /// Start watching `address` from the next block onwards.
    async fn subscribe(&self, address: &str) -> Result<(), WatchError>;

    /// Everything recorded for `address`, oldest first.
    async fn transactions(&self, address: &str) -> Result<Vec<Transaction>, WatchError>;
}

/// [`QueryFacade`] that reads straight from an [`AddressLedger`].
pub struct LedgerFacade {
    ledger: Arc<dyn AddressLedger>,
    span: Span,
}

impl LedgerFacade {
    pub fn new(ledger: Arc<dyn AddressLedger>, span: Span) -> Self {
        Self { ledger, span }
    }
}

#[async_trait]
impl QueryFacade for LedgerFacade {
    async fn current_block(&self) -> Result<u64, WatchError> {
        self.ledger.checkpoint().await
    }

    async fn subscribe(&self, address: &str) -> Result<(), WatchError> {
        self.ledger.register_address(address).await?;
        tracing::info!(parent: &self.span, address = %address, "Subscribed");
        Ok(())
    }

    async fn transactions(&self, address: &str) -> Result<Vec<Transaction>, WatchError> {
        self.ledger.transactions(address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_storage::InMemoryLedger;

    fn facade() -> (LedgerFacade, InMemoryLedger) {
        let ledger = InMemoryLedger::new();
        let facade = LedgerFacade::new(Arc::new(ledger.clone()), Span::none());
        (facade, ledger)
    }

    #[tokio::test]
    async fn current_block_is_checkpoint() {
        let (facade, ledger) = facade();
        let mut scope = ledger.begin_write().await.unwrap();
        scope.set_checkpoint(42);
        scope.commit().await.unwrap();
        assert_eq!(facade.current_block().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn subscribe_twice_conflicts() {
        let (facade, _) = facade();
        facade.subscribe("0xabc").await.unwrap();
        assert!(matches!(
            facade.subscribe("0xABC").await,
            Err(WatchError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn transactions_distinguish_unknown_from_empty() {
        let (facade, _) = facade();
        assert!(facade.transactions("0xabc").await.unwrap_err().is_not_found());
        facade.subscribe("0xabc").await.unwrap();
        assert!(facade.transactions("0xabc").await.unwrap().is_empty());
    }
}
