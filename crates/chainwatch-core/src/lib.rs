//! chainwatch-core: foundation for the address-watching ingestion pipeline.
//!
//! # Architecture
//!
//! ```text
//! IndexLoop (chainwatch-evm)
//!     ├── ChainClient     (head height + block by number)
//!     ├── AddressLedger   (subscriptions, per-address buckets, checkpoint)
//!     │     └── WriteScope (one cycle's staged appends + pending checkpoint)
//!     └── IngestConfig    (tick interval, request timeout)
//!
//! QueryFacade (chainwatch-api) ── reads the same AddressLedger
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod ledger;
pub mod types;

pub use client::ChainClient;
pub use config::IngestConfig;
pub use error::WatchError;
pub use ledger::{AddressLedger, WriteScope};
pub use types::{normalize_address, Block, Transaction};
