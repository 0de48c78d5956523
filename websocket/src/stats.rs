//! Client counters reported by the periodic stats line.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct GatewayStats {
    connected: AtomicU64,
    disconnected: AtomicU64,
    failed: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Connections accepted since start.
    pub connected: u64,
    /// Connections currently open.
    pub active: u64,
    /// Connections ended by a failed or timed-out write.
    pub failed: u64,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_connected(&self) {
        self.connected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_disconnected(&self, write_failed: bool) {
        self.disconnected.fetch_add(1, Ordering::Relaxed);
        if write_failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let connected = self.connected.load(Ordering::Relaxed);
        let disconnected = self.disconnected.load(Ordering::Relaxed);
        StatsSnapshot {
            connected,
            active: connected.saturating_sub(disconnected),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
