//! Upstream relay feed.
//!
//! The relay pushes already-decoded chain events as JSON text frames:
//!
//! ```text
//! {"type": "events", "data": {"contract": "0x..", "txid": "0x..", "call": {..}}}
//! {"type": "blocks", "data": {"hash": "0x..", ..}}
//! ```
//!
//! `events` go to the `event` topic and to the topic named by
//! `data.contract`; `blocks` go to `block`. A message that does not decode is
//! skipped on its own. When the relay drops the connection the feed
//! reconnects with backoff.

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use txtap_network::{Backoff, BackoffPolicy};
use txtap_types::{topics, WireEvent};

use crate::{EventSink, NodeError};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: Value,
}

fn string_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

/// Decode one relay message into the `(topic, event)` pairs to publish.
pub fn route_envelope(text: &str) -> Result<Vec<(String, WireEvent)>, NodeError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| NodeError::Relay(format!("undecodable envelope: {e}")))?;
    if !envelope.data.is_object() {
        return Err(NodeError::Relay(format!("{} envelope without an object body", envelope.kind)));
    }

    match envelope.kind.as_str() {
        "events" => {
            let id = string_field(&envelope.data, "txid").unwrap_or_default().to_string();
            let contract = string_field(&envelope.data, "contract").map(str::to_string);
            let event = WireEvent::relayed(topics::EVENT, id, envelope.data);
            let mut routes = vec![(topics::EVENT.to_string(), event.clone())];
            if let Some(contract) = contract.filter(|c| !c.is_empty()) {
                routes.push((contract, event));
            }
            Ok(routes)
        }
        "blocks" => {
            let id = string_field(&envelope.data, "hash").unwrap_or_default().to_string();
            Ok(vec![(
                topics::BLOCK.to_string(),
                WireEvent::relayed(topics::BLOCK, id, envelope.data),
            )])
        }
        other => Err(NodeError::Relay(format!("unknown envelope type {other:?}"))),
    }
}

pub struct RelayFeed {
    url: String,
    sink: EventSink,
    backoff: BackoffPolicy,
}

impl RelayFeed {
    pub fn new(url: impl Into<String>, sink: EventSink, backoff: BackoffPolicy) -> Self {
        Self {
            url: url.into(),
            sink,
            backoff,
        }
    }

    /// Stream from the relay until `shutdown` flips to `true` or its sender
    /// goes away, reconnecting whenever the connection ends.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(self.backoff);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let ended = tokio::select! {
                ended = self.stream_once(&mut backoff) => ended,
                _ = shutdown.changed() => break,
            };

            let delay = backoff.next_delay();
            warn!(
                url = %self.url,
                error = %ended,
                retry_in_ms = delay.as_millis() as u64,
                "relay connection ended, reconnecting"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("relay feed stopped");
    }

    /// One connection's lifetime. Always ends in an error describing why.
    async fn stream_once(&self, backoff: &mut Backoff) -> NodeError {
        let mut ws = match tokio_tungstenite::connect_async(self.url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => return NodeError::Relay(format!("connect failed: {e}")),
        };
        info!(url = %self.url, "relay connected");
        backoff.reset();

        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Text(text)) => self.dispatch(&text),
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.dispatch(text),
                    Err(_) => debug!("skipping non-utf8 relay frame"),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => return NodeError::Relay(format!("read failed: {e}")),
            }
        }
        NodeError::Relay("relay closed the connection".into())
    }

    fn dispatch(&self, text: &str) {
        match route_envelope(text) {
            Ok(routes) => {
                self.sink.metrics().relay_messages.inc();
                for (topic, event) in routes {
                    self.sink.publish(&topic, event);
                }
            }
            Err(e) => warn!(error = %e, "skipping relay message"),
        }
    }
}
