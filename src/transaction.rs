use serde::{Deserialize, Serialize};

/// A transfer request waiting in the pool or sealed into a block.
///
/// Addresses and amounts are opaque: nothing here checks signatures or
/// balances.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: i64) -> Transaction {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Mining reward paid by the `REWARD_SENDER` pseudo-address.
    pub fn is_reward(&self) -> bool {
        self.sender == crate::constants::REWARD_SENDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_detection() {
        assert!(Transaction::new("0", "miner", 1).is_reward());
        assert!(!Transaction::new("alice", "bob", 100).is_reward());
    }

    #[test]
    fn test_json_shape() {
        let tx = Transaction::new("alice", "bob", 100);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["sender"], "alice");
        assert_eq!(json["recipient"], "bob");
        assert_eq!(json["amount"], 100);
    }
}
