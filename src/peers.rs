use std::collections::BTreeSet;

use log::info;
use url::Url;

use crate::error::{LedgerError, Result};

/// Known peer nodes, stored as normalized `host:port` strings.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    nodes: BTreeSet<String>,
}

impl PeerRegistry {
    pub fn new() -> PeerRegistry {
        PeerRegistry::default()
    }

    /// Normalize `address` and add it. Returns the normalized form.
    pub fn register(&mut self, address: &str) -> Result<String> {
        let node = normalize_address(address)?;
        if self.nodes.insert(node.clone()) {
            info!("registered peer {}", node);
        }
        Ok(node)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.nodes.iter().cloned().collect()
    }
}

/// Reduce `http://host:port/path` (or a bare `host:port`) to `host:port`.
///
/// The port falls back to the scheme's default when omitted.
pub fn normalize_address(address: &str) -> Result<String> {
    let address = address.trim();
    let invalid = || LedgerError::MalformedInput(format!("invalid URL: {}", address));

    let url = if address.contains("://") {
        Url::parse(address)
    } else {
        Url::parse(&format!("http://{}", address))
    }
    .map_err(|_| invalid())?;

    let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
    let port = url.port_or_known_default().ok_or_else(invalid)?;
    Ok(format!("{}:{}", host, port))
}
