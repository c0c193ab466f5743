/// Number of leading `'0'` hex digits a proof hash must carry.
pub const DEFAULT_DIFFICULTY: usize = 4;

pub const GENESIS_PROOF: u64 = 100;
/// `previous_hash` of the genesis block. Never a valid hex digest.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// Sender used for the coinbase-style mining reward.
pub const REWARD_SENDER: &str = "0";
pub const DEFAULT_MINING_REWARD: i64 = 1;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_PEER_TIMEOUT_MS: u64 = 5_000;
/// Upper bound on one wire message (one JSON line), chain replies included.
pub const DEFAULT_MAX_MESSAGE_BYTES: u64 = 16 * 1024 * 1024;
