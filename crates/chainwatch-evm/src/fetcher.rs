//! Ethereum chain client.
//!
//! Implements [`ChainClient`] on top of any [`RpcTransport`] using
//! `eth_blockNumber` and `eth_getBlockByNumber(<hex>, true)`.
//! Transport failures and malformed replies surface as
//! [`WatchError::Unavailable`]; a `null` block as [`WatchError::BlockNotFound`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::Span;

use chainwatch_core::client::ChainClient;
use chainwatch_core::error::WatchError;
use chainwatch_core::types::{Block, Transaction};
use chainwatch_rpc::{RpcTransport, TransportError};

/// A block as returned by `eth_getBlockByNumber` with full transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcBlock {
    pub number: String,
    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
}

/// A transaction object inside an [`RpcBlock`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTransaction {
    pub hash: String,
    pub from: String,
    /// `null` for contract creations.
    #[serde(default)]
    pub to: Option<String>,
    pub value: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
}

impl RpcTransaction {
    fn into_transaction(self, block_hex: &str) -> Transaction {
        Transaction {
            hash: self.hash,
            from: self.from,
            to: self.to.unwrap_or_default(),
            value: self.value,
            block_number: self.block_number.unwrap_or_else(|| block_hex.to_string()),
        }
    }
}

/// [`ChainClient`] for Ethereum JSON-RPC nodes.
pub struct EthChainClient<T> {
    transport: T,
    next_id: AtomicU64,
    span: Span,
}

impl<T: RpcTransport> EthChainClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_span(transport, tracing::info_span!("eth_client"))
    }

    pub fn with_span(transport: T, span: Span) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
            span,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn unavailable(&self, method: &str, e: TransportError) -> WatchError {
        tracing::debug!(
            parent: &self.span,
            method,
            url = %self.transport.url(),
            error = %e,
            "chain request failed"
        );
        WatchError::Unavailable(format!("{method}: {e}"))
    }
}

#[async_trait]
impl<T: RpcTransport> ChainClient for EthChainClient<T> {
    async fn current_height(&self) -> Result<u64, WatchError> {
        let hex: String = self
            .transport
            .call(self.next_id(), "eth_blockNumber", vec![])
            .await
            .map_err(|e| self.unavailable("eth_blockNumber", e))?;
        parse_hex_u64(&hex)
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, WatchError> {
        let block_hex = format!("{number:#x}");
        let raw: Option<RpcBlock> = self
            .transport
            .call(
                self.next_id(),
                "eth_getBlockByNumber",
                vec![Value::String(block_hex.clone()), json!(true)],
            )
            .await
            .map_err(|e| self.unavailable("eth_getBlockByNumber", e))?;

        let raw = raw.ok_or(WatchError::BlockNotFound(number))?;
        let returned = parse_hex_u64(&raw.number)?;
        if returned != number {
            return Err(WatchError::Unavailable(format!(
                "node returned block {returned} for request {number}"
            )));
        }

        let transactions = raw
            .transactions
            .into_iter()
            .map(|tx| tx.into_transaction(&block_hex))
            .collect();
        Ok(Block::new(number, transactions))
    }
}

/// Parse a hex quantity (`0x`-prefixed or bare) into a `u64`.
///
/// Malformed input is an [`WatchError::Unavailable`] reply, never zero.
pub fn parse_hex_u64(s: &str) -> Result<u64, WatchError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() {
        return Err(WatchError::Unavailable(format!("invalid hex quantity {s:?}")));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| WatchError::Unavailable(format!("invalid hex quantity {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_rpc::{JsonRpcRequest, JsonRpcResponse};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Transport answering by method name; unknown methods fail like a dead node.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: HashMap<String, Value>,
        seen: Mutex<Vec<JsonRpcRequest>>,
    }

    impl ScriptedTransport {
        fn reply(mut self, method: &str, result: Value) -> Self {
            self.replies.insert(method.to_string(), result);
            self
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            self.seen.lock().unwrap().push(req.clone());
            match self.replies.get(&req.method) {
                Some(result) => Ok(JsonRpcResponse::ok(1, result.clone())),
                None => Err(TransportError::Http("connection refused".into())),
            }
        }

        fn url(&self) -> &str {
            "mock://node"
        }
    }

    #[test]
    fn parse_hex_u64_basic() {
        assert_eq!(parse_hex_u64("0x1").unwrap(), 1);
        assert_eq!(parse_hex_u64("0xff").unwrap(), 255);
        assert_eq!(parse_hex_u64("1234").unwrap(), 0x1234);
        assert_eq!(parse_hex_u64("0X10").unwrap(), 16);
    }

    #[test]
    fn parse_hex_u64_rejects_garbage() {
        assert!(parse_hex_u64("0x").is_err());
        assert!(parse_hex_u64("0xzz").is_err());
        assert!(matches!(parse_hex_u64(""), Err(WatchError::Unavailable(_))));
    }

    #[tokio::test]
    async fn current_height_parses_hex() {
        let client = EthChainClient::new(
            ScriptedTransport::default().reply("eth_blockNumber", json!("0x1312d00")),
        );
        assert_eq!(client.current_height().await.unwrap(), 20_000_000);
    }

    #[tokio::test]
    async fn current_height_transport_failure_is_unavailable() {
        let client = EthChainClient::new(ScriptedTransport::default());
        let err = client.current_height().await.unwrap_err();
        assert!(matches!(err, WatchError::Unavailable(_)), "got {err}");
    }

    #[tokio::test]
    async fn block_request_uses_hex_number_and_full_transactions() {
        let client = EthChainClient::new(ScriptedTransport::default().reply(
            "eth_getBlockByNumber",
            json!({ "number": "0xa", "transactions": [] }),
        ));
        client.block_by_number(10).await.unwrap();

        let seen = client.transport().seen.lock().unwrap();
        assert_eq!(seen[0].params, vec![json!("0xa"), json!(true)]);
    }

    #[tokio::test]
    async fn block_maps_transactions() {
        let client = EthChainClient::new(ScriptedTransport::default().reply(
            "eth_getBlockByNumber",
            json!({
                "number": "0xa",
                "hash": "0xblock",
                "transactions": [
                    { "hash": "0x01", "from": "0xA", "to": "0xB", "value": "0x5", "blockNumber": "0xa", "nonce": "0x0" },
                    { "hash": "0x02", "from": "0xC", "to": null, "value": "0x0", "blockNumber": "0xa" }
                ]
            }),
        ));
        let block = client.block_by_number(10).await.unwrap();
        assert_eq!(block.number, 10);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].to, "0xB");
        assert_eq!(block.transactions[0].block_number, "0xa");
        assert_eq!(block.transactions[1].to, "");
    }

    #[tokio::test]
    async fn null_block_is_not_found() {
        let client = EthChainClient::new(
            ScriptedTransport::default().reply("eth_getBlockByNumber", Value::Null),
        );
        assert_eq!(
            client.block_by_number(99).await.unwrap_err(),
            WatchError::BlockNotFound(99)
        );
    }

    #[tokio::test]
    async fn mismatched_block_number_is_unavailable() {
        let client = EthChainClient::new(ScriptedTransport::default().reply(
            "eth_getBlockByNumber",
            json!({ "number": "0xb", "transactions": [] }),
        ));
        assert!(matches!(
            client.block_by_number(10).await,
            Err(WatchError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn request_ids_increase() {
        let client = EthChainClient::new(
            ScriptedTransport::default().reply("eth_blockNumber", json!("0x1")),
        );
        client.current_height().await.unwrap();
        client.current_height().await.unwrap();
        let seen = client.transport().seen.lock().unwrap();
        assert_ne!(seen[0].id, seen[1].id);
    }
}
