//! Shared types for the ingestion pipeline.

use serde::{Deserialize, Serialize};

// ─── Transaction ──────────────────────────────────────────────────────────────

/// A transaction as stored in an address bucket and served to callers.
///
/// `value` and `block_number` are kept exactly as the node delivered them
/// (hex quantities on Ethereum); the pipeline never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash (`0x…`).
    pub hash: String,
    /// Sender address.
    pub from: String,
    /// Receiver address; empty for contract creations.
    pub to: String,
    /// Transferred value, opaque.
    pub value: String,
    /// Containing block number, opaque.
    #[serde(rename = "blockNumber")]
    pub block_number: String,
}

impl Transaction {
    /// Returns `true` if `address` is the sender or the receiver.
    pub fn touches(&self, address: &str) -> bool {
        self.from.eq_ignore_ascii_case(address) || self.to.eq_ignore_ascii_case(address)
    }

    /// The distinct normalized addresses this transaction touches (1 or 2).
    pub fn participants(&self) -> Vec<String> {
        let from = normalize_address(&self.from);
        let to = normalize_address(&self.to);
        if to.is_empty() || to == from {
            vec![from]
        } else {
            vec![from, to]
        }
    }
}

// ─── Block ────────────────────────────────────────────────────────────────────

/// A block with its full, ordered transaction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(number: u64, transactions: Vec<Transaction>) -> Self {
        Self { number, transactions }
    }
}

/// Canonical form of an address used as a subscription key.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(from: &str, to: &str) -> Transaction {
        Transaction {
            hash: "0xh".into(),
            from: from.into(),
            to: to.into(),
            value: "0x1".into(),
            block_number: "0xa".into(),
        }
    }

    #[test]
    fn touches_sender_or_receiver() {
        let t = tx("0xAAA", "0xbbb");
        assert!(t.touches("0xaaa")); // case-insensitive
        assert!(t.touches("0xBBB"));
        assert!(!t.touches("0xccc"));
    }

    #[test]
    fn participants_dedupes_self_transfer() {
        assert_eq!(tx("0xA", "0xa").participants(), vec!["0xa".to_string()]);
        assert_eq!(tx("0xA", "0xB").participants(), vec!["0xa".to_string(), "0xb".to_string()]);
    }

    #[test]
    fn participants_skips_empty_receiver() {
        // contract creation
        assert_eq!(tx("0xA", "").participants(), vec!["0xa".to_string()]);
    }

    #[test]
    fn serializes_with_block_number_in_camel_case() {
        let json = serde_json::to_value(tx("0x1", "0x2")).unwrap();
        assert_eq!(json["blockNumber"], "0xa");
        assert!(json.get("block_number").is_none());
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_address("  0xAbC "), "0xabc");
    }
}
