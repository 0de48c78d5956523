//! Candidate peers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A node to connect to: its P2P address and, optionally, the JSON-RPC
/// interface of the same node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerEndpoint {
    /// `host:port` of the P2P listener.
    pub p2p: String,
    /// Base URL of the node's JSON-RPC interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc: Option<String>,
}

impl PeerEndpoint {
    pub fn new(p2p: impl Into<String>) -> Self {
        Self {
            p2p: p2p.into(),
            rpc: None,
        }
    }

    pub fn with_rpc(p2p: impl Into<String>, rpc: impl Into<String>) -> Self {
        Self {
            p2p: p2p.into(),
            rpc: Some(rpc.into()),
        }
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.p2p)
    }
}
