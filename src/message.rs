//! Line-delimited JSON messages exchanged with a node.
//!
//! Each request and each response is a single JSON object on its own line.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::block::Block;
use crate::blockchain::PeerChain;
use crate::error::{LedgerError, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Chain,
    Mine,
    // Fields stay optional here so a missing one is reported as a
    // rejection instead of a parse failure.
    NewTransaction {
        sender: Option<String>,
        recipient: Option<String>,
        amount: Option<i64>,
    },
    RegisterNodes {
        nodes: Option<Vec<String>>,
    },
    Resolve,
}

impl Request {
    pub fn new_transaction(sender: &str, recipient: &str, amount: i64) -> Request {
        Request::NewTransaction {
            sender: Some(sender.to_string()),
            recipient: Some(recipient.to_string()),
            amount: Some(amount),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Chain(PeerChain),
    Mined {
        message: String,
        block: Block,
    },
    TransactionAccepted {
        message: String,
        index: u64,
    },
    NodesRegistered {
        message: String,
        total_nodes: Vec<String>,
    },
    Resolved {
        message: String,
        replaced: bool,
        chain: Vec<Block>,
    },
    Error {
        message: String,
    },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Response {
        Response::Error {
            message: message.into(),
        }
    }

    pub fn into_result(self) -> Result<Response> {
        match self {
            Response::Error { message } => Err(LedgerError::Protocol(message)),
            other => Ok(other),
        }
    }
}

/// Write `msg` as one JSON line and flush.
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one line, refusing lines longer than `limit` bytes.
///
/// Returns `None` at end of stream. A final line without a trailing newline
/// is still returned.
pub async fn read_message<R>(reader: &mut R, limit: u64) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = (&mut *reader).take(limit.saturating_add(1)).read_line(&mut line).await?;
    if read == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') && read as u64 > limit {
        return Err(LedgerError::MessageTooLarge(limit));
    }
    let end = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(end);
    Ok(Some(line))
}
