//! Prometheus metrics for the watcher.
//!
//! [`WatcherMetrics`] owns a dedicated [`Registry`]; the gateway's
//! `/metrics` route encodes it in the text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

pub struct WatcherMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Inventory notices received, labelled by kind (`tx`, `block`, ...).
    pub inventory_announcements: IntCounterVec,
    /// Transaction announcements dropped because the lookup failed.
    pub lookups_failed: IntCounter,
    /// Events handed to the hub, labelled by topic.
    pub events_published: IntCounterVec,
    /// Per-subscriber deliveries skipped by the hub.
    pub deliveries_dropped: IntCounter,
    /// Relay messages routed to local topics.
    pub relay_messages: IntCounter,
    /// Peer sessions that completed the handshake.
    pub session_starts: IntCounter,
    pub session_failures: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub peer_connected: IntGauge,
    pub gateway_clients: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// `getrawtransaction` round trip, in milliseconds.
    pub lookup_latency_ms: Histogram,
}

impl WatcherMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let inventory_announcements = register_int_counter_vec_with_registry!(
            Opts::new("txtap_inventory_announcements_total", "Inventory notices received from the peer"),
            &["kind"],
            registry
        )?;
        let lookups_failed = register_int_counter_with_registry!(
            Opts::new("txtap_lookups_failed_total", "Transaction lookups that failed"),
            registry
        )?;
        let events_published = register_int_counter_vec_with_registry!(
            Opts::new("txtap_events_published_total", "Events published to the hub"),
            &["topic"],
            registry
        )?;
        let deliveries_dropped = register_int_counter_with_registry!(
            Opts::new("txtap_deliveries_dropped_total", "Deliveries skipped for unready subscribers"),
            registry
        )?;
        let relay_messages = register_int_counter_with_registry!(
            Opts::new("txtap_relay_messages_total", "Relay messages routed to local topics"),
            registry
        )?;
        let session_starts = register_int_counter_with_registry!(
            Opts::new("txtap_session_starts_total", "Peer sessions that completed the handshake"),
            registry
        )?;
        let session_failures = register_int_counter_with_registry!(
            Opts::new("txtap_session_failures_total", "Peer sessions that ended"),
            registry
        )?;

        let peer_connected = register_int_gauge_with_registry!(
            Opts::new("txtap_peer_connected", "1 while a peer session is established"),
            registry
        )?;
        let gateway_clients = register_int_gauge_with_registry!(
            Opts::new("txtap_gateway_clients", "Currently connected websocket clients"),
            registry
        )?;

        // 1 ms to ~16 s.
        let lookup_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new("txtap_lookup_latency_ms", "Transaction lookup latency in milliseconds")
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            inventory_announcements,
            lookups_failed,
            events_published,
            deliveries_dropped,
            relay_messages,
            session_starts,
            session_failures,
            peer_connected,
            gateway_clients,
            lookup_latency_ms,
        })
    }

    /// Text exposition of every metric in the registry.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
