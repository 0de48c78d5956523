//! Watcher configuration with TOML file support.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use txtap_network::{BackoffPolicy, SessionConfig};
use txtap_protocol::version::DEFAULT_USER_AGENT;
use txtap_protocol::ChecksumPolicy;
use txtap_types::{Network, NetworkMagic, PeerEndpoint};
use txtap_websocket::GatewayConfig;

use crate::{LogFormat, NodeError};

/// Configuration for one watcher process.
///
/// Loaded from TOML via [`WatcherConfig::from_toml_file`] or built in code
/// (tests). Every key is optional; missing keys take the defaults of the
/// selected network profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Network profile: `main`, `test` or `private`.
    #[serde(default = "default_network")]
    pub network: Network,

    /// Overrides the profile's magic number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magic: Option<NetworkMagic>,

    /// RPC URLs tried when the active peer has no paired RPC endpoint.
    #[serde(default)]
    pub rpc_fallback: Vec<String>,

    /// Upstream relay WebSocket URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,

    #[serde(default = "default_websocket_bind")]
    pub websocket_bind: String,

    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,

    /// Port announced in our `version`; defaults to the profile P2P port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertised_port: Option<u16>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Reject frames whose checksum does not match.
    #[serde(default = "default_true")]
    pub verify_checksum: bool,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Per-subscriber delivery buffer.
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,

    #[serde(default = "default_client_ping_interval_secs")]
    pub client_ping_interval_secs: u64,

    #[serde(default = "default_client_write_timeout_secs")]
    pub client_write_timeout_secs: u64,

    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,

    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,

    /// Serve `/metrics` on the gateway listener.
    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Peer endpoints; empty means the profile's seed list.
    #[serde(default)]
    pub peers: Vec<PeerEndpoint>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> Network {
    Network::Main
}

fn default_websocket_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_websocket_port() -> u16 {
    8080
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_ping_interval_ms() -> u64 {
    1000
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_reconnect_initial_ms() -> u64 {
    500
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_subscriber_capacity() -> usize {
    txtap_hub::DEFAULT_CAPACITY
}

fn default_client_ping_interval_secs() -> u64 {
    300
}

fn default_client_write_timeout_secs() -> u64 {
    30
}

fn default_rpc_timeout_secs() -> u64 {
    10
}

fn default_stats_interval_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WatcherConfig {
    /// Defaults for `network`.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject configurations the watcher cannot start with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.endpoints().is_empty() {
            return Err(NodeError::Config(format!(
                "no peers configured and network {} has no default seeds",
                self.network
            )));
        }
        if let Some(peer) = self.peers.iter().find(|p| p.p2p.trim().is_empty()) {
            return Err(NodeError::Config(format!("peer with empty p2p address: {peer:?}")));
        }
        for url in self.peers.iter().filter_map(|p| p.rpc.as_ref()).chain(&self.rpc_fallback) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(NodeError::Config(format!("rpc url must be http(s): {url}")));
            }
        }
        if let Some(url) = &self.relay_url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(NodeError::Config(format!("relay_url must be ws(s): {url}")));
            }
        }
        if self.subscriber_capacity == 0 {
            return Err(NodeError::Config("subscriber_capacity must be at least 1".into()));
        }
        let intervals = [
            ("ping_interval_ms", self.ping_interval_ms),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("reconnect_initial_ms", self.reconnect_initial_ms),
            ("client_ping_interval_secs", self.client_ping_interval_secs),
            ("client_write_timeout_secs", self.client_write_timeout_secs),
            ("rpc_timeout_secs", self.rpc_timeout_secs),
            ("stats_interval_secs", self.stats_interval_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, v)| *v == 0) {
            return Err(NodeError::Config(format!("{name} must be greater than zero")));
        }
        if self.reconnect_max_ms < self.reconnect_initial_ms {
            return Err(NodeError::Config(
                "reconnect_max_ms must not be below reconnect_initial_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn magic(&self) -> NetworkMagic {
        self.magic.unwrap_or_else(|| self.network.magic())
    }

    /// Configured peers, or the profile's seeds when none are configured.
    pub fn endpoints(&self) -> Vec<PeerEndpoint> {
        if self.peers.is_empty() {
            self.network.default_seeds()
        } else {
            self.peers.clone()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            magic: self.magic(),
            advertised_port: self
                .advertised_port
                .unwrap_or_else(|| self.network.default_p2p_port()),
            user_agent: self.user_agent.clone(),
            checksum: if self.verify_checksum {
                ChecksumPolicy::Strict
            } else {
                ChecksumPolicy::Permissive
            },
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(self.reconnect_initial_ms),
            max: Duration::from_millis(self.reconnect_max_ms),
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            ping_interval: Duration::from_secs(self.client_ping_interval_secs),
            write_timeout: Duration::from_secs(self.client_write_timeout_secs),
        }
    }

    pub fn gateway_addr(&self) -> String {
        format!("{}:{}", self.websocket_bind, self.websocket_port)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            magic: None,
            rpc_fallback: Vec::new(),
            relay_url: None,
            websocket_bind: default_websocket_bind(),
            websocket_port: default_websocket_port(),
            advertised_port: None,
            user_agent: default_user_agent(),
            verify_checksum: true,
            ping_interval_ms: default_ping_interval_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            subscriber_capacity: default_subscriber_capacity(),
            client_ping_interval_secs: default_client_ping_interval_secs(),
            client_write_timeout_secs: default_client_write_timeout_secs(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
            stats_interval_secs: default_stats_interval_secs(),
            enable_metrics: false,
            log_format: LogFormat::Human,
            log_level: default_log_level(),
            peers: Vec::new(),
        }
    }
}
