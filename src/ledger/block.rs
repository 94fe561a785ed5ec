//! Ledger blocks and canonical hashing
//!
//! Block hashes are computed over a canonical JSON serialization of
//! `{index, timestamp, data, prev_hash}`: UTF-8, lexicographically sorted
//! keys, compact `,`/`:` separators. Verification re-hashes from stored
//! fields, so this encoding must stay byte-reproducible.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::crypto::CryptoProvider;

/// `prev_hash` of the genesis block.
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// One immutable entry in the hash chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerBlock {
    pub index: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub data: Map<String, Value>,
    /// Hash of the preceding block; all zeros for genesis.
    pub prev_hash: String,
    /// SHA-256 over the canonical serialization, 64 hex chars.
    pub hash: String,
    /// Hex-encoded 32-byte HMAC tag over the hash string.
    pub signature: String,
}

/// Canonical serialization used exclusively for hashing.
///
/// `serde_json::Value` objects keep their keys in a sorted map and
/// `to_string` emits compact separators, which together give the canonical
/// byte form. Values built by this crate never contain non-finite numbers,
/// so serialization cannot fail.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(value).expect("JSON value serialization cannot fail")
}

impl LedgerBlock {
    /// Compute the canonical hash for the given block fields.
    pub fn compute_hash(
        index: u64,
        timestamp: f64,
        data: &Map<String, Value>,
        prev_hash: &str,
    ) -> String {
        let content = json!({
            "index": index,
            "timestamp": timestamp,
            "data": data,
            "prev_hash": prev_hash,
        });
        CryptoProvider::hash_hex(canonical_json(&content).as_bytes())
    }

    /// Build and sign a new block.
    pub fn new(
        crypto: &CryptoProvider,
        index: u64,
        timestamp: f64,
        data: Map<String, Value>,
        prev_hash: String,
    ) -> Self {
        let hash = Self::compute_hash(index, timestamp, &data, &prev_hash);
        let signature = hex::encode(crypto.sign(hash.as_bytes()));
        Self {
            index,
            timestamp,
            data,
            prev_hash,
            hash,
            signature,
        }
    }

    /// Re-derive the hash from stored fields and compare.
    pub fn verify_hash(&self) -> bool {
        self.hash == Self::compute_hash(self.index, self.timestamp, &self.data, &self.prev_hash)
    }

    /// Verify the stored signature against the stored hash.
    pub fn verify_signature(&self, crypto: &CryptoProvider) -> bool {
        match hex::decode(&self.signature) {
            Ok(tag) => crypto.verify(self.hash.as_bytes(), &tag),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("decision".to_string(), json!("APPROVE"));
        data.insert("amount".to_string(), json!(1500.5));
        data
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value = json!({"zebra": 1, "alpha": {"nested_z": 2, "nested_a": 3}});
        assert_eq!(
            canonical_json(&value),
            r#"{"alpha":{"nested_a":3,"nested_z":2},"zebra":1}"#
        );
    }

    #[test]
    fn test_block_hash_round_trips() {
        let crypto = CryptoProvider::generate();
        let block = LedgerBlock::new(
            &crypto,
            1,
            1_700_000_000.25,
            payload(),
            GENESIS_PREV_HASH.to_string(),
        );

        assert_eq!(block.hash.len(), 64);
        assert!(block.verify_hash());
        assert!(block.verify_signature(&crypto));
    }

    #[test]
    fn test_mutated_payload_breaks_hash() {
        let crypto = CryptoProvider::generate();
        let mut block = LedgerBlock::new(
            &crypto,
            1,
            1_700_000_000.0,
            payload(),
            GENESIS_PREV_HASH.to_string(),
        );

        block
            .data
            .insert("amount".to_string(), json!(999_999.0));
        assert!(!block.verify_hash());
        // The signature still covers the stored hash string.
        assert!(block.verify_signature(&crypto));
    }

    #[test]
    fn test_non_hex_signature_fails_verification() {
        let crypto = CryptoProvider::generate();
        let mut block = LedgerBlock::new(
            &crypto,
            0,
            0.0,
            Map::new(),
            GENESIS_PREV_HASH.to_string(),
        );

        block.signature = "not-hex".to_string();
        assert!(!block.verify_signature(&crypto));
    }

    #[test]
    fn test_hash_depends_on_every_field() {
        let data = payload();
        let base = LedgerBlock::compute_hash(1, 10.0, &data, GENESIS_PREV_HASH);

        assert_ne!(base, LedgerBlock::compute_hash(2, 10.0, &data, GENESIS_PREV_HASH));
        assert_ne!(base, LedgerBlock::compute_hash(1, 11.0, &data, GENESIS_PREV_HASH));
        assert_ne!(
            base,
            LedgerBlock::compute_hash(1, 10.0, &Map::new(), GENESIS_PREV_HASH)
        );
        let other_prev = "11".repeat(32);
        assert_ne!(base, LedgerBlock::compute_hash(1, 10.0, &data, &other_prev));
    }
}
