use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::constants::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
use crate::hasher;
use crate::transaction::Transaction;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Block {
    /// Position in the chain, starting at 1 for genesis.
    pub index: u64,
    /// Seconds since the UNIX epoch at seal time.
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    pub fn new_block(index: u64, transactions: Vec<Transaction>, proof: u64, previous_hash: String) -> Block {
        Block {
            index,
            timestamp: now_secs(),
            transactions,
            proof,
            previous_hash,
        }
    }

    pub fn new_genesis_block() -> Block {
        Block::new_block(1, Vec::new(), GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string())
    }

    pub fn hash(&self) -> String {
        hasher::hash_block(self)
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
