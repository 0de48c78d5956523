//! Upgrade handler and per-client pump.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior};
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use txtap_hub::EventHub;
use txtap_types::WireEvent;

use crate::{GatewayError, GatewayStats};

#[derive(Clone, Copy, Debug)]
pub struct GatewayConfig {
    /// Period of the empty keep-alive message.
    pub ping_interval: Duration,
    /// Deadline for every single write.
    pub write_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(300),
            write_timeout: Duration::from_secs(30),
        }
    }
}

pub struct GatewayState {
    pub hub: Arc<EventHub<WireEvent>>,
    pub stats: Arc<GatewayStats>,
    pub config: GatewayConfig,
}

impl GatewayState {
    pub fn new(hub: Arc<EventHub<WireEvent>>, config: GatewayConfig) -> Self {
        Self {
            hub,
            stats: Arc::new(GatewayStats::new()),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TopicQuery {
    channel: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl TopicQuery {
    fn topic(self) -> Option<String> {
        self.channel
            .or(self.kind)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Routes `/` and `/ws`, with permissive CORS.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` flips to `true`.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), GatewayError> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "websocket gateway listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<TopicQuery>,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    let Some(topic) = query.topic() else {
        return (StatusCode::BAD_REQUEST, "missing channel").into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, topic, state))
}

#[derive(Debug)]
enum PumpEnd {
    ClientClosed,
    ReadFailed(String),
    WriteFailed(String),
    WriteTimeout,
    HubClosed,
}

impl PumpEnd {
    fn is_write_failure(&self) -> bool {
        matches!(self, PumpEnd::WriteFailed(_) | PumpEnd::WriteTimeout)
    }
}

async fn send_with_deadline(
    sender: &mut SplitSink<WebSocket, Message>,
    message: Message,
    deadline: Duration,
) -> Result<(), PumpEnd> {
    match tokio::time::timeout(deadline, sender.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PumpEnd::WriteFailed(e.to_string())),
        Err(_) => Err(PumpEnd::WriteTimeout),
    }
}

/// First tick one `period` from now. Ticks missed behind a slow write are
/// not replayed.
fn keepalive_timer(period: Duration) -> Interval {
    let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// One client: forward hub events, write keep-alives, answer pings.
async fn handle_socket(socket: WebSocket, topic: String, state: Arc<GatewayState>) {
    let mut subscription = state.hub.subscribe(&topic);
    state.stats.client_connected();
    debug!(topic = %topic, "subscriber connected");

    let (mut sender, mut receiver) = socket.split();
    let config = state.config;
    let mut keepalive = keepalive_timer(config.ping_interval);

    let end = loop {
        let step = tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => {
                    send_with_deadline(&mut sender, Message::Text(event.to_json()), config.write_timeout).await
                }
                None => Err(PumpEnd::HubClosed),
            },
            _ = keepalive.tick() => {
                send_with_deadline(&mut sender, Message::Text(WireEvent::keepalive().to_json()), config.write_timeout).await
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    send_with_deadline(&mut sender, Message::Pong(data), config.write_timeout).await
                }
                Some(Ok(Message::Close(_))) | None => Err(PumpEnd::ClientClosed),
                Some(Ok(_)) => Ok(()),
                Some(Err(e)) => Err(PumpEnd::ReadFailed(e.to_string())),
            },
        };
        if let Err(end) = step {
            break end;
        }
    };

    state.hub.unsubscribe(&topic, subscription.id());
    state.stats.client_disconnected(end.is_write_failure());
    debug!(topic = %topic, reason = ?end, "subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio_tungstenite::tungstenite::Message as ClientMessage;

    const WAIT: Duration = Duration::from_secs(2);

    async fn spawn_gateway(config: GatewayConfig) -> (String, Arc<GatewayState>, watch::Sender<bool>) {
        let hub = Arc::new(EventHub::new());
        let state = Arc::new(GatewayState::new(hub, config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, shutdown) = watch::channel(false);
        let app = router(state.clone());
        tokio::spawn(async move {
            let _ = serve(listener, app, shutdown).await;
        });
        (format!("ws://{addr}"), state, stop)
    }

    async fn wait_for_subscribers(state: &GatewayState, topic: &str, n: usize) {
        tokio::time::timeout(WAIT, async {
            while state.hub.subscriber_count(topic) != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn next_json<S>(ws: &mut S) -> Value
    where
        S: futures_util::Stream<Item = Result<ClientMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
            if let ClientMessage::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn delivers_hub_events_on_channel_topic() {
        let (base, state, _stop) = spawn_gateway(GatewayConfig::default()).await;
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("{base}/?channel=tx")).await.unwrap();
        wait_for_subscribers(&state, "tx", 1).await;

        let outcome = state
            .hub
            .publish("tx", WireEvent::transaction("abcd", json!({"type": "ContractTransaction"})));
        assert_eq!(outcome.delivered, 1);

        let v = next_json(&mut ws).await;
        assert_eq!(v["type"], "tx");
        assert_eq!(v["txID"], "abcd");
        assert_eq!(v["data"]["type"], "ContractTransaction");
    }

    #[tokio::test]
    async fn ws_path_accepts_type_parameter() {
        let (base, state, _stop) = spawn_gateway(GatewayConfig::default()).await;
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("{base}/ws?type=block")).await.unwrap();
        wait_for_subscribers(&state, "block", 1).await;

        state.hub.publish("block", WireEvent::block("ff00"));
        let v = next_json(&mut ws).await;
        assert_eq!(v["type"], "block");
        assert!(v.get("data").is_none());
    }

    #[tokio::test]
    async fn missing_topic_is_rejected() {
        let (base, _state, _stop) = spawn_gateway(GatewayConfig::default()).await;
        assert!(tokio_tungstenite::connect_async(format!("{base}/ws")).await.is_err());
    }

    #[tokio::test]
    async fn idle_client_gets_keepalive() {
        let config = GatewayConfig {
            ping_interval: Duration::from_millis(30),
            ..GatewayConfig::default()
        };
        let (base, _state, _stop) = spawn_gateway(config).await;
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("{base}/?channel=tx")).await.unwrap();
        let v = next_json(&mut ws).await;
        assert_eq!(v, json!({"type": "", "txID": ""}));
    }

    #[tokio::test]
    async fn client_ping_is_answered() {
        let (base, _state, _stop) = spawn_gateway(GatewayConfig::default()).await;
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("{base}/?channel=tx")).await.unwrap();
        ws.send(ClientMessage::Ping(b"hi".to_vec())).await.unwrap();
        let msg = tokio::time::timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(msg, ClientMessage::Pong(b"hi".to_vec()));
    }

    #[tokio::test]
    async fn closing_client_unsubscribes() {
        let (base, state, _stop) = spawn_gateway(GatewayConfig::default()).await;
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("{base}/?channel=tx")).await.unwrap();
        wait_for_subscribers(&state, "tx", 1).await;

        ws.close(None).await.unwrap();
        wait_for_subscribers(&state, "tx", 0).await;
        let snapshot = state.stats.snapshot();
        assert_eq!(snapshot.connected, 1);
        assert_eq!(snapshot.active, 0);
        assert_eq!(snapshot.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_skips_missed_ticks() {
        let period = Duration::from_secs(300);
        let mut timer = keepalive_timer(period);
        tokio::time::advance(period * 4).await;
        timer.tick().await;
        let next = tokio::time::timeout(period / 2, timer.tick()).await;
        assert!(next.is_err(), "missed keep-alives were replayed");
    }

    #[test]
    fn channel_wins_over_type() {
        let q = TopicQuery {
            channel: Some("tx".into()),
            kind: Some("block".into()),
        };
        assert_eq!(q.topic().as_deref(), Some("tx"));
        let blank = TopicQuery {
            channel: Some("  ".into()),
            kind: None,
        };
        assert!(blank.topic().is_none());
    }
}
