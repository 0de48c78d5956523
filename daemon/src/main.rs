//! txtap daemon: watches a NEO-style P2P network and streams transactions
//! to websocket subscribers.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use txtap_node::{init_logging, LogFormat, Watcher, WatcherConfig};
use txtap_types::{Network, PeerEndpoint};

#[derive(Parser, Debug)]
#[command(name = "txtap", about = "P2P transaction watcher with a websocket feed")]
struct Cli {
    /// Network profile: "main", "test" or "private".
    /// When a config file is provided, defaults to the file's value.
    #[arg(long, env = "TXTAP_NETWORK")]
    network: Option<Network>,

    /// Path to a TOML configuration file. File settings are the base;
    /// flags and env vars override them.
    #[arg(long, env = "TXTAP_CONFIG")]
    config: Option<PathBuf>,

    /// Websocket gateway port.
    #[arg(long, env = "TXTAP_PORT")]
    port: Option<u16>,

    /// Websocket gateway bind address.
    #[arg(long, env = "TXTAP_BIND")]
    bind: Option<String>,

    /// Peers to watch, comma-separated `host:port` or `host:port=http://rpc-host:port`.
    #[arg(long = "peer", env = "TXTAP_PEERS", value_delimiter = ',', value_parser = parse_peer)]
    peers: Vec<PeerEndpoint>,

    /// RPC URLs used when the active peer has none (comma-separated).
    #[arg(long, env = "TXTAP_RPC_FALLBACK", value_delimiter = ',')]
    rpc_fallback: Vec<String>,

    /// Upstream relay websocket URL.
    #[arg(long, env = "TXTAP_RELAY_URL")]
    relay_url: Option<String>,

    /// Accept frames with a bad checksum.
    #[arg(long, env = "TXTAP_NO_CHECKSUM")]
    no_checksum: bool,

    /// Serve Prometheus metrics at `/metrics`.
    #[arg(long, env = "TXTAP_METRICS")]
    metrics: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TXTAP_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "TXTAP_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

fn parse_peer(s: &str) -> Result<PeerEndpoint, String> {
    let (p2p, rpc) = match s.split_once('=') {
        Some((p2p, rpc)) => (p2p.trim(), Some(rpc.trim())),
        None => (s.trim(), None),
    };
    if p2p.is_empty() {
        return Err(format!("peer {s:?} has no p2p address"));
    }
    Ok(match rpc {
        Some(rpc) if !rpc.is_empty() => PeerEndpoint::with_rpc(p2p, rpc),
        _ => PeerEndpoint::new(p2p),
    })
}

impl Cli {
    /// File config (or the profile defaults) with flags applied on top.
    fn resolve(self) -> anyhow::Result<WatcherConfig> {
        let base = match &self.config {
            Some(path) => WatcherConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => WatcherConfig::default(),
        };

        let mut config = WatcherConfig {
            network: self.network.unwrap_or(base.network),
            websocket_port: self.port.unwrap_or(base.websocket_port),
            websocket_bind: self.bind.unwrap_or(base.websocket_bind),
            relay_url: self.relay_url.or(base.relay_url),
            verify_checksum: base.verify_checksum && !self.no_checksum,
            enable_metrics: self.metrics || base.enable_metrics,
            log_level: self.log_level.unwrap_or(base.log_level),
            log_format: self.log_format.unwrap_or(base.log_format),
            ..base
        };
        if !self.peers.is_empty() {
            config.peers = self.peers;
        }
        if !self.rpc_fallback.is_empty() {
            config.rpc_fallback = self.rpc_fallback;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let print_config = cli.print_config;
    let config = cli.resolve()?;

    if print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    init_logging(config.log_format, &config.log_level).context("installing log subscriber")?;

    let watcher = Watcher::new(config)?;
    let shutdown = watcher.shutdown_controller();
    tokio::spawn(async move { shutdown.wait_for_signal().await });

    tracing::info!(
        network = %watcher.config().network,
        gateway = %watcher.config().gateway_addr(),
        "starting txtap"
    );
    watcher.run().await?;

    tracing::info!("txtap exited cleanly");
    Ok(())
}
