pub mod block;
pub mod blockchain;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod hasher;
pub mod message;
pub mod node;
pub mod peers;
pub mod pow;
pub mod server;
pub mod transaction;
pub mod transport;

pub use block::Block;
pub use blockchain::{Ledger, PeerChain};
pub use error::{LedgerError, Result};
pub use node::Node;
pub use transaction::Transaction;
