//! chainwatch-storage: address ledger backends for ChainWatch.
//!
//! Backends:
//! - [`memory`]: in-memory (volatile, lives as long as the process)

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
pub use memory::{InMemoryLedger, MemoryWriteScope};
