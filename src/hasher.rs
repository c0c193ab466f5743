//! Canonical block hashing.
//!
//! A block is hashed as the SHA-256 digest of its JSON form with object keys
//! sorted at every level. `serde_json::Value` keeps objects in a `BTreeMap`,
//! so rendering through `Value` yields the sorted form regardless of how the
//! fields were declared or received.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::block::Block;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Compact JSON with sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    value.to_string()
}

fn canonical_value(block: &Block) -> Value {
    json!({
        "index": block.index,
        "timestamp": block.timestamp,
        "transactions": block.transactions,
        "proof": block.proof,
        "previous_hash": block.previous_hash,
    })
}

pub fn hash_block(block: &Block) -> String {
    sha256_hex(canonical_json(&canonical_value(block)).as_bytes())
}
