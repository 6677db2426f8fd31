//! Error types for the chainwatch pipeline.

use thiserror::Error;

/// Errors shared by the chain client, the ledger and the query façade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    /// Upstream chain read failed. Transient: the next tick retries.
    #[error("chain unavailable: {0}")]
    Unavailable(String),

    #[error("address not found: {0}")]
    AddressNotFound(String),

    #[error("block {0} not found")]
    BlockNotFound(u64),

    #[error("address already registered: {0}")]
    AlreadyRegistered(String),

    /// Store-level failure (poisoned lock, concurrent writer, ...).
    #[error("internal error: {0}")]
    Internal(String),
}

impl WatchError {
    /// Returns `true` for either flavour of "does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AddressNotFound(_) | Self::BlockNotFound(_))
    }

    /// Returns `true` if retrying the same read later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
