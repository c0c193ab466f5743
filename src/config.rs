use std::time::Duration;

use crate::constants::*;
use crate::error::Result;
use crate::pow::ProofOfWork;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the node service binds to.
    pub listen_addr: String,
    /// Leading zero hex digits required of a proof.
    pub difficulty: usize,
    pub mining_reward: i64,
    /// Upper bound on a single peer chain fetch.
    pub peer_timeout: Duration,
    /// Recipient of this node's mining rewards.
    pub node_id: String,
    /// Peers registered at start-up.
    pub seed_peers: Vec<String>,
    /// Longest request or peer reply the node will read.
    pub max_message_bytes: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            peer_timeout: Duration::from_millis(DEFAULT_PEER_TIMEOUT_MS),
            node_id: random_node_id(),
            seed_peers: Vec::new(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl NodeConfig {
    pub fn pow(&self) -> Result<ProofOfWork> {
        ProofOfWork::new(self.difficulty)
    }
}

/// 128 random bits as lowercase hex.
pub fn random_node_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
