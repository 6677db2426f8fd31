//! chainwatch-evm: Ethereum chain client and the address index loop.

pub mod builder;
pub mod fetcher;
pub mod index_loop;

pub use builder::WatcherBuilder;
pub use fetcher::{parse_hex_u64, EthChainClient, RpcBlock, RpcTransaction};
pub use index_loop::{CycleOutcome, IndexLoop};
