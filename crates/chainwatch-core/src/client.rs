//! The `ChainClient` capability consumed by the index loop.

use async_trait::async_trait;

use crate::error::WatchError;
use crate::types::Block;

/// Read access to a chain: the current head and full blocks by number.
///
/// Implementations must never paper over a failed read with a stale or zero
/// value; every transport or protocol problem is an error.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current chain head height.
    ///
    /// Fails with [`WatchError::Unavailable`] on any transport/protocol error.
    async fn current_height(&self) -> Result<u64, WatchError>;

    /// Full block `number` with its ordered transactions.
    ///
    /// Fails with [`WatchError::BlockNotFound`] if the block does not exist
    /// yet, or [`WatchError::Unavailable`] if the read failed.
    async fn block_by_number(&self, number: u64) -> Result<Block, WatchError>;
}
