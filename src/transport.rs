//! Fetching chains from peers.

use std::future::Future;

use tokio::io::BufReader;
use tokio::net::TcpStream;

use crate::blockchain::PeerChain;
use crate::constants::DEFAULT_MAX_MESSAGE_BYTES;
use crate::error::{LedgerError, Result};
use crate::message::{read_message, write_message, Request, Response};

/// Anything that can hand back a peer's current chain.
pub trait ChainSource {
    fn fetch_chain(&self, peer: &str) -> impl Future<Output = Result<PeerChain>> + Send;
}

/// Fetches chains from other nodes over their TCP service.
#[derive(Debug, Clone, Copy)]
pub struct TcpChainSource {
    max_message_bytes: u64,
}

impl Default for TcpChainSource {
    fn default() -> Self {
        TcpChainSource::new(DEFAULT_MAX_MESSAGE_BYTES)
    }
}

impl TcpChainSource {
    /// Replies longer than `max_message_bytes` count as a failed fetch.
    pub fn new(max_message_bytes: u64) -> TcpChainSource {
        TcpChainSource { max_message_bytes }
    }
}

impl ChainSource for TcpChainSource {
    fn fetch_chain(&self, peer: &str) -> impl Future<Output = Result<PeerChain>> + Send {
        let peer = peer.to_string();
        let limit = self.max_message_bytes;
        async move {
            match request_with_limit(&peer, &Request::Chain, limit).await {
                Ok(Response::Chain(chain)) => Ok(chain),
                Ok(other) => Err(LedgerError::UnreachablePeer {
                    peer,
                    reason: format!("unexpected response: {:?}", other),
                }),
                Err(e) => Err(LedgerError::UnreachablePeer {
                    peer,
                    reason: e.to_string(),
                }),
            }
        }
    }
}

/// Send one request to the node at `addr` and wait for its reply.
pub async fn request(addr: &str, request: &Request) -> Result<Response> {
    request_with_limit(addr, request, DEFAULT_MAX_MESSAGE_BYTES).await
}

async fn request_with_limit(addr: &str, request: &Request, limit: u64) -> Result<Response> {
    let stream = TcpStream::connect(addr).await?;
    let (read, mut write) = stream.into_split();
    write_message(&mut write, request).await?;

    let mut reader = BufReader::new(read);
    match read_message(&mut reader, limit).await? {
        Some(line) => Ok(serde_json::from_str(&line)?),
        None => Err(LedgerError::Protocol(format!(
            "{} closed the connection without replying",
            addr
        ))),
    }
}
