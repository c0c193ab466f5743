//! Proof-of-work puzzle.
//!
//! A candidate proof is valid for the previous block's proof when
//! `sha256("<last_proof><candidate>")` starts with `difficulty` zero hex
//! digits. The search is a plain linear scan from zero, so the answer for a
//! given `last_proof` and difficulty is always the same.

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use sha2::{Digest, Sha256};

use crate::constants::DEFAULT_DIFFICULTY;
use crate::error::{LedgerError, Result};

/// Upper bound: a SHA-256 digest has 64 hex digits.
const MAX_DIFFICULTY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: usize,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork {
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Result<ProofOfWork> {
        if difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidDifficulty(difficulty));
        }
        Ok(ProofOfWork { difficulty })
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn is_valid_proof(&self, last_proof: u64, candidate: u64) -> bool {
        let guess = format!("{}{}", last_proof, candidate);
        let digest = Sha256::digest(guess.as_bytes());
        // Compare nibbles directly instead of rendering the hex string.
        (0..self.difficulty).all(|i| {
            let byte = digest[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            nibble == 0
        })
    }

    pub fn find_proof(&self, last_proof: u64) -> u64 {
        let mut candidate = 0;
        while !self.is_valid_proof(last_proof, candidate) {
            candidate += 1;
        }
        debug!("found proof {} for last proof {}", candidate, last_proof);
        candidate
    }

    /// Same search as [`find_proof`](Self::find_proof), abandoned once `cancel`
    /// is set.
    pub fn find_proof_cancellable(&self, last_proof: u64, cancel: &AtomicBool) -> Option<u64> {
        let mut candidate = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                debug!("proof search for last proof {} cancelled at {}", last_proof, candidate);
                return None;
            }
            if self.is_valid_proof(last_proof, candidate) {
                debug!("found proof {} for last proof {}", candidate, last_proof);
                return Some(candidate);
            }
            candidate += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::sha256_hex;

    #[test]
    fn test_found_proof_is_valid() {
        let pow = ProofOfWork::default();
        let proof = pow.find_proof(100);
        assert!(pow.is_valid_proof(100, proof));
        assert!(sha256_hex(format!("100{}", proof).as_bytes()).starts_with("0000"));
    }

    #[test]
    fn test_search_returns_first_match() {
        let pow = ProofOfWork::new(2).unwrap();
        let proof = pow.find_proof(7);
        assert!((0..proof).all(|p| !pow.is_valid_proof(7, p)));
        assert_eq!(proof, pow.find_proof(7));
    }

    #[test]
    fn test_predicate_matches_hex_prefix() {
        let pow = ProofOfWork::new(3).unwrap();
        for candidate in 0..5_000u64 {
            let hex = sha256_hex(format!("42{}", candidate).as_bytes());
            assert_eq!(pow.is_valid_proof(42, candidate), hex.starts_with("000"));
        }
    }

    #[test]
    fn test_zero_difficulty_accepts_anything() {
        let pow = ProofOfWork::new(0).unwrap();
        assert!(pow.is_valid_proof(1, 1));
        assert_eq!(pow.find_proof(123), 0);
    }

    #[test]
    fn test_difficulty_out_of_range() {
        assert!(ProofOfWork::new(64).is_ok());
        assert!(matches!(
            ProofOfWork::new(65),
            Err(LedgerError::InvalidDifficulty(65))
        ));
    }

    #[test]
    fn test_cancelled_search() {
        let pow = ProofOfWork::new(64).unwrap();
        let cancel = AtomicBool::new(true);
        assert_eq!(pow.find_proof_cancellable(100, &cancel), None);

        let pow = ProofOfWork::new(2).unwrap();
        let cancel = AtomicBool::new(false);
        assert_eq!(pow.find_proof_cancellable(100, &cancel), Some(pow.find_proof(100)));
    }
}
