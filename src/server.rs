use std::net::SocketAddr;

use log::{debug, info, warn};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{LedgerError, Result};
use crate::message::{read_message, write_message, Request, Response};
use crate::node::Node;
use crate::transport::TcpChainSource;

/// Serves a [`Node`] over line-delimited JSON on TCP.
pub struct Server {
    node: Node,
    listener: TcpListener,
}

impl Server {
    pub async fn bind(node: Node) -> Result<Server> {
        let listener = TcpListener::bind(&node.config().listen_addr).await?;
        info!("node {} listening on {}", node.node_id(), listener.local_addr()?);
        Ok(Server { node, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, remote) = self.listener.accept().await?;
            debug!("connection from {}", remote);
            let node = self.node.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(node, stream).await {
                    warn!("connection from {} failed: {}", remote, e);
                }
            });
        }
    }
}

async fn handle_connection(node: Node, stream: TcpStream) -> Result<()> {
    let limit = node.config().max_message_bytes;
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    loop {
        let line = match read_message(&mut reader, limit).await {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()),
            // The rest of the oversized line is still unread, so the
            // connection cannot carry another request.
            Err(e @ LedgerError::MessageTooLarge(_)) => {
                write_message(&mut write, &Response::error(e.to_string())).await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(&node, request).await,
            Err(e) => Response::error(format!("bad request: {}", e)),
        };
        write_message(&mut write, &response).await?;
    }
}

pub async fn handle_request(node: &Node, request: Request) -> Response {
    match dispatch(node, request).await {
        Ok(response) => response,
        Err(e) => Response::error(e.to_string()),
    }
}

async fn dispatch(node: &Node, request: Request) -> Result<Response> {
    match request {
        Request::Chain => Ok(Response::Chain(node.peer_chain())),
        Request::Mine => {
            let block = node.mine().await?;
            Ok(Response::Mined {
                message: "New Block Forged".to_string(),
                block,
            })
        }
        Request::NewTransaction {
            sender,
            recipient,
            amount,
        } => {
            let (sender, recipient, amount) = match (sender, recipient, amount) {
                (Some(s), Some(r), Some(a)) => (s, r, a),
                _ => return Err(LedgerError::MalformedInput("Missing values".to_string())),
            };
            let index = node.submit_transaction(&sender, &recipient, amount);
            Ok(Response::TransactionAccepted {
                message: format!("Transaction will be added to Block {}", index),
                index,
            })
        }
        Request::RegisterNodes { nodes } => {
            let total_nodes = node.register_peers(&nodes.unwrap_or_default())?;
            Ok(Response::NodesRegistered {
                message: "New nodes have been added".to_string(),
                total_nodes,
            })
        }
        Request::Resolve => {
            let source = TcpChainSource::new(node.config().max_message_bytes);
            let replaced = node.resolve(&source).await;
            let message = if replaced {
                "Our chain was replaced"
            } else {
                "Our chain is authoritative"
            };
            Ok(Response::Resolved {
                message: message.to_string(),
                replaced,
                chain: node.chain().to_vec(),
            })
        }
    }
}
