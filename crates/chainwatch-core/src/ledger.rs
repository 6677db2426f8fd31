//! Address ledger traits.
//!
//! The ledger holds the subscribed addresses, one ordered transaction bucket
//! per address, and the global checkpoint (last fully committed block).
//!
//! All ingestion writes go through a [`WriteScope`]: appends and the checkpoint
//! update of one cycle become visible together on `commit`, or not at all.

use async_trait::async_trait;

use crate::error::WatchError;
use crate::types::Transaction;

/// Concurrently readable store of subscriptions, transactions and checkpoint.
///
/// Implementations include `InMemoryLedger` (chainwatch-storage).
#[async_trait]
pub trait AddressLedger: Send + Sync {
    /// Register `address` with an empty bucket.
    ///
    /// Fails with [`WatchError::AlreadyRegistered`] if it already exists;
    /// check and insert are a single atomic step.
    async fn register_address(&self, address: &str) -> Result<(), WatchError>;

    /// Point-in-time snapshot of registered addresses (sorted).
    async fn list_addresses(&self) -> Result<Vec<String>, WatchError>;

    /// Copy of the bucket for `address` in append order.
    ///
    /// Empty (not an error) if registered without transactions;
    /// [`WatchError::AddressNotFound`] if never registered.
    async fn transactions(&self, address: &str) -> Result<Vec<Transaction>, WatchError>;

    /// The last committed block number.
    async fn checkpoint(&self) -> Result<u64, WatchError>;

    /// Open the write scope for one ingestion cycle.
    ///
    /// Only one scope may be open at a time.
    async fn begin_write(&self) -> Result<Box<dyn WriteScope>, WatchError>;
}

/// One cycle's unit of work against an [`AddressLedger`].
///
/// Nothing staged in a scope is visible to readers before `commit`. Dropping a
/// scope without committing discards it.
#[async_trait]
pub trait WriteScope: Send {
    /// Stage `tx` for `address`, observed in block `block_number`.
    ///
    /// Fails with [`WatchError::AddressNotFound`] if `address` is unknown.
    fn append(
        &mut self,
        address: &str,
        block_number: u64,
        tx: Transaction,
    ) -> Result<(), WatchError>;

    /// Set the checkpoint this scope will publish on commit.
    fn set_checkpoint(&mut self, block_number: u64);

    /// The checkpoint staged so far, if any.
    fn pending_checkpoint(&self) -> Option<u64>;

    /// Number of staged appends.
    fn staged(&self) -> usize;

    /// Publish all staged appends and the pending checkpoint atomically.
    ///
    /// Returns the checkpoint visible after the commit. The checkpoint never
    /// moves backwards.
    async fn commit(self: Box<Self>) -> Result<u64, WatchError>;

    /// Discard everything staged in this scope.
    async fn rollback(self: Box<Self>);
}
