use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use log::{info, warn};
use tokio::{task, time};

use crate::block::Block;
use crate::blockchain::{Ledger, PeerChain};
use crate::config::NodeConfig;
use crate::constants::REWARD_SENDER;
use crate::error::{LedgerError, Result};
use crate::peers::PeerRegistry;
use crate::transport::ChainSource;

/// Handle to a running ledger node. Cheap to clone; all clones share state.
///
/// Every read-modify-write of the chain, the pool and the peer set goes
/// through a single mutex. The proof search runs outside the lock.
#[derive(Clone)]
pub struct Node {
    config: Arc<NodeConfig>,
    inner: Arc<Mutex<NodeInner>>,
}

struct NodeInner {
    ledger: Ledger,
    peers: PeerRegistry,
    /// Cancel flags of proof searches in flight.
    mining_jobs: Vec<Arc<AtomicBool>>,
}

/// Unregisters a mining job and stops its search when dropped.
struct MiningJob<'a> {
    node: &'a Node,
    cancel: Arc<AtomicBool>,
}

impl Drop for MiningJob<'_> {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.node
            .lock()
            .mining_jobs
            .retain(|job| !Arc::ptr_eq(job, &self.cancel));
    }
}

impl Node {
    pub fn new(config: NodeConfig) -> Result<Node> {
        let mut peers = PeerRegistry::new();
        for peer in &config.seed_peers {
            peers.register(peer)?;
        }
        let ledger = Ledger::new(config.pow()?);
        info!("node {} ready", config.node_id);
        Ok(Node {
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(NodeInner {
                ledger,
                peers,
                mining_jobs: Vec::new(),
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, NodeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn chain(&self) -> Arc<Vec<Block>> {
        self.lock().ledger.chain()
    }

    pub fn peer_chain(&self) -> PeerChain {
        PeerChain::new(self.chain().to_vec())
    }

    pub fn last_block(&self) -> Block {
        self.lock().ledger.last_block().clone()
    }

    pub fn submit_transaction(&self, sender: &str, recipient: &str, amount: i64) -> u64 {
        self.lock().ledger.submit_transaction(sender, recipient, amount)
    }

    /// Register every address in `addresses`, or none of them if any is
    /// malformed. Returns the full peer list.
    pub fn register_peers(&self, addresses: &[String]) -> Result<Vec<String>> {
        if addresses.is_empty() {
            return Err(LedgerError::MalformedInput(
                "please supply a valid list of nodes".to_string(),
            ));
        }
        let mut inner = self.lock();
        let mut staged = inner.peers.clone();
        for address in addresses {
            staged.register(address)?;
        }
        inner.peers = staged;
        Ok(inner.peers.addresses())
    }

    pub fn peers(&self) -> Vec<String> {
        self.lock().peers.addresses()
    }

    /// Search for the next proof, pay the reward and seal a block.
    ///
    /// Fails with `MiningCancelled` if the chain is replaced during the
    /// search, or `StaleTip` if another block was sealed meanwhile.
    pub async fn mine(&self) -> Result<Block> {
        let (last_proof, last_hash, job) = {
            let mut inner = self.lock();
            let last = inner.ledger.last_block();
            let (last_proof, last_hash) = (last.proof, last.hash());
            let cancel = Arc::new(AtomicBool::new(false));
            inner.mining_jobs.push(Arc::clone(&cancel));
            (last_proof, last_hash, MiningJob { node: self, cancel })
        };

        let pow = *self.lock().ledger.pow();
        let flag = Arc::clone(&job.cancel);
        info!("mining on top of proof {}", last_proof);
        let found = task::spawn_blocking(move || pow.find_proof_cancellable(last_proof, &flag)).await;
        drop(job);
        let proof = found?.ok_or(LedgerError::MiningCancelled)?;

        let mut inner = self.lock();
        if inner.ledger.last_block().hash() != last_hash {
            warn!("discarding proof {}: tip moved while mining", proof);
            return Err(LedgerError::StaleTip);
        }
        inner
            .ledger
            .submit_transaction(REWARD_SENDER, &self.config.node_id, self.config.mining_reward);
        Ok(inner.ledger.seal_block(proof, Some(last_hash)))
    }

    /// Abort every proof search in flight.
    pub fn cancel_mining(&self) {
        for job in &self.lock().mining_jobs {
            job.store(true, Ordering::Relaxed);
        }
    }

    /// Fetch every registered peer's chain and adopt the longest valid one.
    ///
    /// Peers that fail or time out are skipped for this round and stay
    /// registered.
    pub async fn resolve<S: ChainSource + Sync>(&self, source: &S) -> bool {
        let timeout = self.config.peer_timeout;
        let fetches = self.peers().into_iter().map(|peer| async move {
            let result = match time::timeout(timeout, source.fetch_chain(&peer)).await {
                Ok(result) => result,
                Err(_) => Err(LedgerError::UnreachablePeer {
                    peer: peer.clone(),
                    reason: "timed out".to_string(),
                }),
            };
            (peer, result)
        });

        let mut collected = BTreeMap::new();
        for (peer, result) in join_all(fetches).await {
            match result {
                Ok(chain) => {
                    collected.insert(peer, chain);
                }
                Err(e) => warn!("skipping peer {}: {}", peer, e),
            }
        }

        let mut inner = self.lock();
        let replaced = inner.ledger.resolve_conflicts(&collected);
        if replaced {
            for job in &inner.mining_jobs {
                job.store(true, Ordering::Relaxed);
            }
        }
        replaced
    }
}
