//! Turning peer announcements into hub events.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use txtap_hub::{EventHub, PublishOutcome};
use txtap_network::{NetworkError, SessionDelegate};
use txtap_protocol::VersionPayload;
use txtap_rpc::{select_best_node, RpcError, TransactionDetail, TransactionSource};
use txtap_types::{topics, InventoryNotice, InventoryType, PeerEndpoint, WireEvent};

use crate::WatcherMetrics;

/// Publishing side of the hub, with the bookkeeping every publisher does.
#[derive(Clone)]
pub struct EventSink {
    hub: Arc<EventHub<WireEvent>>,
    metrics: Arc<WatcherMetrics>,
}

impl EventSink {
    pub fn new(hub: Arc<EventHub<WireEvent>>, metrics: Arc<WatcherMetrics>) -> Self {
        Self { hub, metrics }
    }

    pub fn publish(&self, topic: &str, event: WireEvent) -> PublishOutcome {
        let outcome = self.hub.publish(topic, event);
        self.metrics.events_published.with_label_values(&[topic]).inc();
        self.metrics.deliveries_dropped.inc_by(outcome.dropped as u64);
        trace!(topic = %topic, delivered = outcome.delivered, dropped = outcome.dropped, "published");
        outcome
    }

    pub fn metrics(&self) -> &WatcherMetrics {
        &self.metrics
    }
}

/// Session delegate that enriches transaction announcements over RPC and
/// publishes transactions and blocks to their topics.
///
/// Transactions are looked up through the RPC interface paired with the
/// peer that announced them. A transaction whose lookup fails is dropped. A
/// later announcement of the same hash is handled like any other.
pub struct IngestionAdapter {
    sink: EventSink,
    source: Arc<dyn TransactionSource>,
    rpc_fallback: Vec<String>,
}

impl IngestionAdapter {
    pub fn new(sink: EventSink, source: Arc<dyn TransactionSource>) -> Self {
        Self {
            sink,
            source,
            rpc_fallback: Vec::new(),
        }
    }

    /// RPC URLs ranked by `getblockcount` when the announcing peer has no
    /// paired RPC endpoint.
    pub fn with_rpc_fallback(mut self, urls: Vec<String>) -> Self {
        self.rpc_fallback = urls;
        self
    }

    async fn rpc_endpoint(&self, origin: &PeerEndpoint) -> Result<String, RpcError> {
        if let Some(url) = &origin.rpc {
            return Ok(url.clone());
        }
        select_best_node(self.source.as_ref(), &self.rpc_fallback)
            .await
            .map(|best| {
                debug!(url = %best.url, height = best.height, "using fallback rpc node");
                best.url
            })
            .ok_or(RpcError::NoEndpoint)
    }

    async fn lookup(&self, origin: &PeerEndpoint, txid: &str) -> Result<TransactionDetail, RpcError> {
        let endpoint = self.rpc_endpoint(origin).await?;
        let started = Instant::now();
        let detail = self.source.get_raw_transaction(&endpoint, txid).await?;
        self.sink
            .metrics()
            .lookup_latency_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        Ok(detail)
    }

    /// Handle one notice announced by `origin`. Returns the publish outcome,
    /// or `None` when nothing was published.
    pub async fn handle_notice(&self, origin: &PeerEndpoint, notice: InventoryNotice) -> Option<PublishOutcome> {
        self.sink
            .metrics()
            .inventory_announcements
            .with_label_values(&[notice.kind.as_str()])
            .inc();
        let id = notice.id();

        match notice.kind {
            InventoryType::Transaction => match self.lookup(origin, &id).await {
                Ok(detail) => Some(self.sink.publish(topics::TX, WireEvent::transaction(id, detail.into_value()))),
                Err(e) => {
                    self.sink.metrics().lookups_failed.inc();
                    warn!(txid = %id, peer = %origin, error = %e, "transaction lookup failed, announcement dropped");
                    None
                }
            },
            InventoryType::Block => Some(self.sink.publish(topics::BLOCK, WireEvent::block(id))),
            InventoryType::Consensus | InventoryType::Unknown(_) => {
                trace!(kind = %notice.kind, hash = %id, "inventory not surfaced");
                None
            }
        }
    }
}

#[async_trait]
impl SessionDelegate for IngestionAdapter {
    async fn on_connected(&self, origin: &PeerEndpoint, version: VersionPayload) {
        let metrics = self.sink.metrics();
        metrics.session_starts.inc();
        metrics.peer_connected.set(1);
        info!(
            peer = %origin,
            user_agent = %version.user_agent,
            start_height = version.start_height,
            rpc = ?origin.rpc,
            "peer connected"
        );
    }

    async fn on_receive(&self, origin: &PeerEndpoint, notice: InventoryNotice) {
        self.handle_notice(origin, notice).await;
    }

    async fn on_error(&self, error: &NetworkError) {
        let metrics = self.sink.metrics();
        metrics.session_failures.inc();
        metrics.peer_connected.set(0);
        debug!(kind = error.kind(), error = %error, "peer session ended");
    }
}
