//! The endpoint of the session that most recently completed its handshake.

use std::sync::{Arc, RwLock};

use txtap_types::PeerEndpoint;

/// Shared, cheaply cloneable handle. Written by the session on handshake and
/// on teardown, read by transaction lookups.
#[derive(Clone, Debug, Default)]
pub struct ActivePeer {
    inner: Arc<RwLock<Option<PeerEndpoint>>>,
}

impl ActivePeer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<PeerEndpoint> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Paired RPC URL of the active peer, if both exist.
    pub fn rpc_url(&self) -> Option<String> {
        self.get().and_then(|peer| peer.rpc)
    }

    pub fn set(&self, endpoint: PeerEndpoint) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(endpoint);
    }

    /// Clear only if `endpoint` is still the one recorded, so a late teardown
    /// cannot wipe a newer session's entry.
    pub fn clear_if(&self, endpoint: &PeerEndpoint) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref() == Some(endpoint) {
            *guard = None;
        }
    }
}
