use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// A request was missing a required field or carried an unusable value.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A peer-supplied chain failed validation.
    #[error("chain from {peer} is invalid: {reason}")]
    InvalidChain { peer: String, reason: String },

    /// A peer could not be reached within this reconciliation round.
    #[error("peer {peer} unreachable: {reason}")]
    UnreachablePeer { peer: String, reason: String },

    #[error("difficulty {0} out of range (0..=64)")]
    InvalidDifficulty(usize),

    /// The proof search was aborted because the chain was replaced.
    #[error("mining cancelled")]
    MiningCancelled,

    /// The proof was found but the tip moved while searching.
    #[error("chain tip moved while mining")]
    StaleTip,

    /// A single message ran past the per-line byte limit.
    #[error("message exceeds {0} bytes")]
    MessageTooLarge(u64),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
