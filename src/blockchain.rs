use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::error::{LedgerError, Result};
use crate::pow::ProofOfWork;
use crate::transaction::Transaction;

/// A chain as reported by a peer, together with the length it claims.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PeerChain {
    pub length: usize,
    pub chain: Vec<Block>,
}

impl PeerChain {
    pub fn new(chain: Vec<Block>) -> PeerChain {
        PeerChain {
            length: chain.len(),
            chain,
        }
    }
}

/// The chain of sealed blocks plus the pool of transactions waiting for the
/// next block.
///
/// The chain lives behind an `Arc` so callers can hold a snapshot while the
/// ledger keeps appending. Appends go through `Arc::make_mut`, which clones
/// the vector only if a snapshot is still alive; reconciliation swaps the
/// whole `Arc`.
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Arc<Vec<Block>>,
    pending: Vec<Transaction>,
    pow: ProofOfWork,
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::new(ProofOfWork::default())
    }
}

impl Ledger {
    pub fn new(pow: ProofOfWork) -> Ledger {
        info!("creating ledger with difficulty {}", pow.difficulty());
        Ledger {
            chain: Arc::new(vec![Block::new_genesis_block()]),
            pending: Vec::new(),
            pow,
        }
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Snapshot of the current chain.
    pub fn chain(&self) -> Arc<Vec<Block>> {
        Arc::clone(&self.chain)
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .unwrap_or_else(|| unreachable!("ledger always holds the genesis block"))
    }

    /// Queue a transaction and return the index of the block that will hold it.
    pub fn submit_transaction(&mut self, sender: &str, recipient: &str, amount: i64) -> u64 {
        self.pending.push(Transaction::new(sender, recipient, amount));
        let index = self.last_block().index + 1;
        debug!("queued {} -> {} ({}) for block {}", sender, recipient, amount, index);
        index
    }

    /// Seal the pending pool into a new block and append it.
    ///
    /// `previous_hash` defaults to the hash of the current tip.
    pub fn seal_block(&mut self, proof: u64, previous_hash: Option<String>) -> Block {
        let previous_hash = previous_hash.unwrap_or_else(|| self.last_block().hash());
        let index = self.chain.len() as u64 + 1;
        let transactions = std::mem::take(&mut self.pending);
        let block = Block::new_block(index, transactions, proof, previous_hash);
        Arc::make_mut(&mut self.chain).push(block.clone());
        info!(
            "sealed block {} with {} transactions",
            block.index,
            block.transactions.len()
        );
        block
    }

    /// Check hash links and proofs along `chain`.
    pub fn is_chain_valid(&self, chain: &[Block]) -> bool {
        for pair in chain.windows(2) {
            let (last, block) = (&pair[0], &pair[1]);
            if block.previous_hash != last.hash() {
                debug!("block {} does not link to block {}", block.index, last.index);
                return false;
            }
            if !self.pow.is_valid_proof(last.proof, block.proof) {
                debug!("block {} carries an invalid proof", block.index);
                return false;
            }
        }
        true
    }

    /// A peer chain is acceptable when its reported length matches the blocks
    /// sent and it passes [`is_chain_valid`](Self::is_chain_valid).
    fn check_peer_chain(&self, peer: &str, reported: &PeerChain) -> Result<()> {
        if reported.length != reported.chain.len() {
            return Err(LedgerError::InvalidChain {
                peer: peer.to_string(),
                reason: format!(
                    "reported length {} but sent {} blocks",
                    reported.length,
                    reported.chain.len()
                ),
            });
        }
        if !self.is_chain_valid(&reported.chain) {
            return Err(LedgerError::InvalidChain {
                peer: peer.to_string(),
                reason: "hash link or proof check failed".to_string(),
            });
        }
        Ok(())
    }

    /// Adopt the longest valid chain among `peer_chains`.
    ///
    /// Only a chain strictly longer than ours can win; on equal lengths the
    /// first peer in address order keeps the candidacy. Returns whether our
    /// chain was replaced.
    pub fn resolve_conflicts(&mut self, peer_chains: &BTreeMap<String, PeerChain>) -> bool {
        let mut max_length = self.chain.len();
        let mut candidate: Option<&Vec<Block>> = None;

        for (peer, reported) in peer_chains {
            if reported.length <= max_length {
                continue;
            }
            if let Err(e) = self.check_peer_chain(peer, reported) {
                warn!("rejecting chain of length {}: {}", reported.length, e);
                continue;
            }
            max_length = reported.length;
            candidate = Some(&reported.chain);
        }

        match candidate {
            Some(chain) => {
                info!("replacing chain of length {} with {}", self.chain.len(), chain.len());
                self.chain = Arc::new(chain.clone());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn easy() -> ProofOfWork {
        ProofOfWork::new(2).unwrap()
    }

    fn mine(ledger: &mut Ledger) -> Block {
        let proof = ledger.pow().find_proof(ledger.last_block().proof);
        ledger.seal_block(proof, None)
    }

    fn ledger_with_len(len: usize) -> Ledger {
        let mut ledger = Ledger::new(easy());
        while ledger.chain().len() < len {
            ledger.submit_transaction("a", "b", ledger.chain().len() as i64);
            mine(&mut ledger);
        }
        ledger
    }

    fn peers(entries: Vec<(&str, PeerChain)>) -> BTreeMap<String, PeerChain> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_new_ledger_has_genesis() {
        let ledger = Ledger::default();
        assert_eq!(ledger.chain().len(), 1);
        assert_eq!(ledger.last_block().index, 1);
        assert_eq!(ledger.last_block().proof, 100);
        assert_eq!(ledger.last_block().previous_hash, "1");
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn test_submit_returns_next_index() {
        let mut ledger = Ledger::new(easy());
        assert_eq!(ledger.submit_transaction("alice", "bob", 5), 2);
        assert_eq!(ledger.submit_transaction("bob", "carol", 1), 2);
        mine(&mut ledger);
        assert_eq!(ledger.submit_transaction("carol", "dave", 3), 3);
    }

    #[test]
    fn test_pool_lifecycle() {
        let mut ledger = Ledger::new(easy());
        ledger.submit_transaction("a", "b", 1);
        ledger.submit_transaction("c", "d", 2);
        let first = mine(&mut ledger);
        assert!(ledger.pending().is_empty());
        assert_eq!(
            first.transactions,
            vec![Transaction::new("a", "b", 1), Transaction::new("c", "d", 2)]
        );

        ledger.submit_transaction("e", "f", 3);
        let second = mine(&mut ledger);
        assert_eq!(second.transactions, vec![Transaction::new("e", "f", 3)]);
        // the earlier block is untouched
        assert_eq!(ledger.chain()[1].transactions.len(), 2);
    }

    #[test]
    fn test_seal_links_and_indexes() {
        let ledger = ledger_with_len(5);
        let chain = ledger.chain();
        for i in 1..chain.len() {
            assert_eq!(chain[i].index, chain[i - 1].index + 1);
            assert_eq!(chain[i].previous_hash, chain[i - 1].hash());
        }
    }

    #[test]
    fn test_seal_uses_explicit_previous_hash() {
        let mut ledger = Ledger::new(easy());
        let block = ledger.seal_block(7, Some("feed".to_string()));
        assert_eq!(block.previous_hash, "feed");
        assert_eq!(ledger.last_block(), &block);
    }

    #[test]
    fn test_snapshot_is_not_mutated_by_append() {
        let mut ledger = Ledger::new(easy());
        let snapshot = ledger.chain();
        mine(&mut ledger);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(ledger.chain().len(), 2);
    }

    #[test]
    fn test_sealed_chain_is_valid() {
        let ledger = ledger_with_len(6);
        assert!(ledger.is_chain_valid(&ledger.chain()));
        assert!(ledger.is_chain_valid(&[]));
        assert!(ledger.is_chain_valid(&ledger.chain()[..1]));
    }

    #[test]
    fn test_tampering_is_detected() {
        let ledger = ledger_with_len(4);
        let chain = ledger.chain().to_vec();

        let mut bad_link = chain.clone();
        bad_link[2].previous_hash = "0".repeat(64);
        assert!(!ledger.is_chain_valid(&bad_link));

        let mut bad_proof = chain.clone();
        let last = bad_proof[2].proof;
        let bad = (0..).find(|p| !ledger.pow().is_valid_proof(last, *p)).unwrap();
        bad_proof[3].proof = bad;
        assert!(!ledger.is_chain_valid(&bad_proof));

        let mut bad_payload = chain;
        bad_payload[1].transactions[0].amount += 1;
        assert!(!ledger.is_chain_valid(&bad_payload));
    }

    #[test]
    fn test_longer_valid_chain_wins() {
        let mut ours = ledger_with_len(3);
        let theirs = ledger_with_len(5);
        let replaced = ours.resolve_conflicts(&peers(vec![(
            "10.0.0.2:5000",
            PeerChain::new(theirs.chain().to_vec()),
        )]));
        assert!(replaced);
        assert_eq!(ours.chain().len(), 5);
        assert_eq!(*ours.chain(), *theirs.chain());
    }

    #[test]
    fn test_invalid_longer_chain_rejected() {
        let mut ours = ledger_with_len(3);
        let mut forged = ledger_with_len(10).chain().to_vec();
        forged[4].previous_hash = "forged".to_string();
        let before = ours.chain();

        let replaced = ours.resolve_conflicts(&peers(vec![("10.0.0.3:5000", PeerChain::new(forged))]));
        assert!(!replaced);
        assert_eq!(*ours.chain(), *before);
    }

    #[test]
    fn test_equal_length_never_replaces() {
        let mut ours = ledger_with_len(4);
        let theirs = ledger_with_len(4);
        let before = ours.chain();
        assert!(!ours.resolve_conflicts(&peers(vec![(
            "10.0.0.2:5000",
            PeerChain::new(theirs.chain().to_vec()),
        )])));
        assert_eq!(*ours.chain(), *before);
    }

    #[test]
    fn test_longest_of_several_peers() {
        let mut ours = ledger_with_len(2);
        let four = ledger_with_len(4);
        let six = ledger_with_len(6);
        let mut forged = ledger_with_len(8).chain().to_vec();
        let parent_proof = forged[6].proof;
        let bad = (0..).find(|p| !ours.pow().is_valid_proof(parent_proof, *p)).unwrap();
        forged[7].proof = bad;

        let replaced = ours.resolve_conflicts(&peers(vec![
            ("a:1", PeerChain::new(four.chain().to_vec())),
            ("b:1", PeerChain::new(six.chain().to_vec())),
            ("c:1", PeerChain::new(forged)),
        ]));
        assert!(replaced);
        assert_eq!(*ours.chain(), *six.chain());
    }

    #[test]
    fn test_misreported_length_rejected() {
        let mut ours = ledger_with_len(3);
        let short = ledger_with_len(2);
        let lying = PeerChain {
            length: 50,
            chain: short.chain().to_vec(),
        };
        assert!(!ours.resolve_conflicts(&peers(vec![("x:1", lying)])));
        assert_eq!(ours.chain().len(), 3);
    }

    #[test]
    fn test_peer_chain_check_reports_reason() {
        let ledger = ledger_with_len(2);
        let good = PeerChain::new(ledger_with_len(3).chain().to_vec());
        assert!(ledger.check_peer_chain("a:1", &good).is_ok());

        let mut tampered = good.clone();
        tampered.chain[2].previous_hash = "0".repeat(64);
        match ledger.check_peer_chain("b:1", &tampered) {
            Err(LedgerError::InvalidChain { peer, reason }) => {
                assert_eq!(peer, "b:1");
                assert!(reason.contains("proof"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let lying = PeerChain {
            length: 9,
            chain: good.chain,
        };
        match ledger.check_peer_chain("c:1", &lying) {
            Err(LedgerError::InvalidChain { reason, .. }) => {
                assert_eq!(reason, "reported length 9 but sent 3 blocks")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_peers_keeps_chain() {
        let mut ours = ledger_with_len(2);
        assert!(!ours.resolve_conflicts(&BTreeMap::new()));
        assert_eq!(ours.chain().len(), 2);
    }

    #[test]
    fn test_alice_bob_scenario() {
        let mut ledger = Ledger::default();
        assert_eq!(ledger.chain().len(), 1);
        assert_eq!(ledger.submit_transaction("alice", "bob", 100), 2);

        let last = ledger.last_block().clone();
        let proof = ledger.pow().find_proof(last.proof);
        assert!(ledger.pow().is_valid_proof(100, proof));
        ledger.submit_transaction("0", "miner", 1);
        let block = ledger.seal_block(proof, Some(last.hash()));

        assert_eq!(block.index, 2);
        assert_eq!(
            block.transactions,
            vec![Transaction::new("alice", "bob", 100), Transaction::new("0", "miner", 1)]
        );
        assert_eq!(ledger.last_block().proof, proof);
        assert!(ledger.is_chain_valid(&ledger.chain()));
    }
}
