//! chainwatch-rpc: JSON-RPC transport used by the chain client.
//!
//! - [`RpcTransport`]: async trait every transport implements
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types
//! - [`TransportError`]: structured error type
//! - [`HttpRpcClient`]: reqwest-backed transport with timeout + retry

pub mod error;
pub mod http;
pub mod request;
pub mod retry;
pub mod transport;

pub use error::TransportError;
pub use http::{HttpClientConfig, HttpRpcClient, DEFAULT_ETHEREUM_RPC_URL};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry::{RetryConfig, RetryPolicy};
pub use transport::RpcTransport;
