//! Wiring every part of the watcher together.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use txtap_hub::EventHub;
use txtap_network::{ActivePeer, ConnectionManager};
use txtap_rpc::{RpcClient, TransactionSource};
use txtap_types::WireEvent;
use txtap_websocket::{router, serve, GatewayState};

use crate::{EventSink, IngestionAdapter, NodeError, RelayFeed, ShutdownController, WatcherConfig, WatcherMetrics};

/// How long background tasks get to finish after shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A configured watcher, ready to [`run`](Watcher::run).
pub struct Watcher {
    config: WatcherConfig,
    hub: Arc<EventHub<WireEvent>>,
    metrics: Arc<WatcherMetrics>,
    source: Arc<dyn TransactionSource>,
    shutdown: Arc<ShutdownController>,
}

impl Watcher {
    /// Validate `config` and build the shared parts. RPC lookups go through
    /// an HTTP client unless replaced with [`with_source`](Self::with_source).
    pub fn new(config: WatcherConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let source: Arc<dyn TransactionSource> = Arc::new(RpcClient::with_timeout(config.rpc_timeout()));
        Ok(Self {
            hub: Arc::new(EventHub::with_capacity(config.subscriber_capacity)),
            metrics: Arc::new(WatcherMetrics::new()?),
            source,
            shutdown: Arc::new(ShutdownController::new()),
            config,
        })
    }

    pub fn with_source(mut self, source: Arc<dyn TransactionSource>) -> Self {
        self.source = source;
        self
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn hub(&self) -> Arc<EventHub<WireEvent>> {
        self.hub.clone()
    }

    pub fn metrics(&self) -> Arc<WatcherMetrics> {
        self.metrics.clone()
    }

    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        self.shutdown.clone()
    }

    /// Bind the configured gateway address and run until shutdown.
    pub async fn run(self) -> Result<(), NodeError> {
        let addr = self.config.gateway_addr();
        let listener = TcpListener::bind(&addr).await.map_err(|source| {
            NodeError::Gateway(txtap_websocket::GatewayError::Bind { addr, source })
        })?;
        self.run_with_listener(listener).await
    }

    /// Run on an already bound gateway listener until shutdown.
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), NodeError> {
        let config = &self.config;
        tracing::info!(
            network = %config.network,
            magic = %config.magic(),
            peers = config.endpoints().len(),
            relay = config.relay_url.is_some(),
            metrics = config.enable_metrics,
            "txtap watcher starting"
        );

        let manager = Arc::new(ConnectionManager::new(
            config.endpoints(),
            config.session_config(),
            config.backoff_policy(),
        )?);
        let sink = EventSink::new(self.hub.clone(), self.metrics.clone());
        let adapter = Arc::new(
            IngestionAdapter::new(sink.clone(), self.source.clone())
                .with_rpc_fallback(config.rpc_fallback.clone()),
        );

        let active = manager.active_peer();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        let shutdown_rx = self.shutdown.subscribe();
        tasks.push(tokio::spawn(async move { manager.run(adapter, shutdown_rx).await }));

        if let Some(url) = &config.relay_url {
            let feed = RelayFeed::new(url.clone(), sink, config.backoff_policy());
            let shutdown_rx = self.shutdown.subscribe();
            tasks.push(tokio::spawn(async move { feed.run(shutdown_rx).await }));
        }

        let state = Arc::new(GatewayState::new(self.hub.clone(), config.gateway_config()));
        let mut app = router(state.clone());
        if config.enable_metrics {
            app = app.merge(metrics_router(self.metrics.clone()));
        }

        tasks.push(tokio::spawn(report_stats(
            state,
            active,
            self.metrics.clone(),
            config.stats_interval(),
            self.shutdown.subscribe(),
        )));

        let served = serve(listener, app, self.shutdown.subscribe()).await;
        if !self.shutdown.is_shutdown() {
            tracing::warn!(error = ?served.as_ref().err(), "gateway stopped before shutdown, stopping watcher");
            self.shutdown.shutdown();
        }

        let wait_all = async {
            for handle in tasks {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(timeout = ?SHUTDOWN_TIMEOUT, "shutdown timeout, some tasks may still be running");
        }

        tracing::info!("txtap watcher stopped");
        served.map_err(NodeError::from)
    }
}

fn metrics_router(metrics: Arc<WatcherMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<WatcherMetrics>>) -> String {
    metrics.render()
}

/// Periodic stats line: elapsed time, current peer and gateway client counters.
async fn report_stats(
    state: Arc<GatewayState>,
    active: ActivePeer,
    metrics: Arc<WatcherMetrics>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = state.stats.snapshot();
                metrics.gateway_clients.set(snapshot.active as i64);
                tracing::info!(
                    elapsed_secs = started.elapsed().as_secs(),
                    peer = ?active.get().map(|p| p.p2p),
                    connected = snapshot.connected,
                    active = snapshot.active,
                    failed = snapshot.failed,
                    topics = state.hub.topic_count(),
                    subscribers = state.hub.total_subscribers(),
                    "gateway stats"
                );
            }
            _ = shutdown.wait_for(|stop| *stop) => break,
        }
    }
}
