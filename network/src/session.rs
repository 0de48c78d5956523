//! One connection to one peer: handshake, keep-alives and the read loop.
//!
//! ```text
//! Connecting -> AwaitingVersion -> AwaitingVerack -> Established -> Closed
//! ```
//!
//! A session is single-use. Whatever ends it (dial failure, transport error,
//! decode error, peer close) is reported to the delegate exactly once and the
//! session moves to `Closed`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use txtap_protocol::version::DEFAULT_USER_AGENT;
use txtap_protocol::{
    build_frame, read_frame, AddrPayload, ChecksumPolicy, Command, Frame, InventoryAnnouncement,
    Payload, PingPayload, VersionPayload,
};
use txtap_types::{InventoryNotice, NetworkMagic, PeerEndpoint};

use crate::{ActivePeer, NetworkError};

/// Lifecycle of a session. Ordered: a session only ever moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    Connecting,
    AwaitingVersion,
    AwaitingVerack,
    Established,
    Closed,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub magic: NetworkMagic,
    /// Listening port announced in our `version`.
    pub advertised_port: u16,
    pub user_agent: String,
    pub checksum: ChecksumPolicy,
    pub ping_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            magic: NetworkMagic::MAIN,
            advertised_port: 10333,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            checksum: ChecksumPolicy::Strict,
            ping_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Receiver of session events.
///
/// `on_connected` and `on_receive` run on their own tasks, so a slow handler
/// never stalls the read loop and no ordering holds between them. Both carry
/// the endpoint of the session that produced them, captured when the frame
/// was read; it stays valid after that session has closed.
#[async_trait]
pub trait SessionDelegate: Send + Sync + 'static {
    /// The peer's `version` arrived and was acknowledged.
    async fn on_connected(&self, origin: &PeerEndpoint, version: VersionPayload);

    /// One hash out of an `inv` frame announced by `origin`.
    async fn on_receive(&self, origin: &PeerEndpoint, notice: InventoryNotice);

    /// The session ended with `error`. Called once per session.
    async fn on_error(&self, error: &NetworkError);
}

/// How a session ended.
#[derive(Debug)]
pub struct SessionOutcome {
    pub error: NetworkError,
    /// Whether the handshake completed before the failure.
    pub established: bool,
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write half shared between the read loop and the ping task.
struct FrameWriter {
    magic: NetworkMagic,
    inner: Mutex<BoxedWriter>,
}

impl FrameWriter {
    async fn send(&self, command: Command, payload: Option<&[u8]>) -> Result<(), NetworkError> {
        let bytes = build_frame(self.magic, &command, payload)?;
        let mut w = self.inner.lock().await;
        w.write_all(&bytes).await?;
        w.flush().await?;
        Ok(())
    }

    async fn send_payload<P: Payload>(&self, command: Command, payload: &P) -> Result<(), NetworkError> {
        self.send(command, Some(&payload.to_bytes())).await
    }
}

/// Per-connection state that lives only while the socket is open.
struct Link {
    writer: Arc<FrameWriter>,
    peer_height: u32,
    verack_pending: bool,
    pinger: Option<JoinHandle<()>>,
    ping_failures: mpsc::Sender<NetworkError>,
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(pinger) = self.pinger.take() {
            pinger.abort();
        }
    }
}

pub struct PeerSession {
    endpoint: PeerEndpoint,
    config: SessionConfig,
    delegate: Arc<dyn SessionDelegate>,
    active: Option<ActivePeer>,
    state: watch::Sender<SessionState>,
}

impl PeerSession {
    pub fn new(endpoint: PeerEndpoint, config: SessionConfig, delegate: Arc<dyn SessionDelegate>) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            endpoint,
            config,
            delegate,
            active: None,
            state,
        }
    }

    /// Record this session's endpoint in `active` once the peer's version is
    /// acknowledged, and clear it again on teardown.
    pub fn with_active_peer(mut self, active: ActivePeer) -> Self {
        self.active = Some(active);
        self
    }

    pub fn endpoint(&self) -> &PeerEndpoint {
        &self.endpoint
    }

    /// Watch handle on the current state.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    fn advance(&self, to: SessionState) {
        self.state.send_if_modified(|state| {
            if to > *state {
                *state = to;
                true
            } else {
                false
            }
        });
    }

    /// Dial the endpoint and run until the session fails.
    pub async fn run(self) -> SessionOutcome {
        let addr = self.endpoint.p2p.clone();
        tracing::debug!(peer = %addr, "dialing peer");
        match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                self.run_on(stream).await
            }
            Ok(Err(e)) => self.finish(NetworkError::Transport(e)).await,
            Err(_) => {
                let timeout_ms = self.config.connect_timeout.as_millis() as u64;
                self.finish(NetworkError::ConnectTimeout { addr, timeout_ms }).await
            }
        }
    }

    /// Run the session over an already connected stream.
    pub async fn run_on<S>(self, stream: S) -> SessionOutcome
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let writer = Arc::new(FrameWriter {
            magic: self.config.magic,
            inner: Mutex::new(Box::new(writer)),
        });
        let error = self.drive(reader, writer).await;
        self.finish(error).await
    }

    async fn finish(self, error: NetworkError) -> SessionOutcome {
        let established = self.current() == SessionState::Established;
        self.advance(SessionState::Closed);
        if let Some(active) = &self.active {
            active.clear_if(&self.endpoint);
        }
        tracing::debug!(peer = %self.endpoint, kind = error.kind(), %error, "peer session closed");
        self.delegate.on_error(&error).await;
        SessionOutcome { error, established }
    }

    async fn drive<R>(&self, mut reader: R, writer: Arc<FrameWriter>) -> NetworkError
    where
        R: AsyncRead + Unpin,
    {
        let (ping_failures, mut ping_failed) = mpsc::channel(1);
        let mut link = Link {
            writer,
            peer_height: 0,
            verack_pending: false,
            pinger: None,
            ping_failures,
        };

        let version = VersionPayload::local(self.config.advertised_port, self.config.user_agent.clone());
        if let Err(e) = link.writer.send_payload(Command::Version, &version).await {
            return e;
        }
        self.advance(SessionState::AwaitingVersion);

        loop {
            let frame = tokio::select! {
                frame = read_frame(&mut reader, self.config.checksum) => match frame {
                    Ok(frame) => frame,
                    Err(e) => return e.into(),
                },
                Some(err) = ping_failed.recv() => return err,
            };
            if let Err(e) = self.handle_frame(frame, &mut link).await {
                return e;
            }
        }
    }

    async fn handle_frame(&self, frame: Frame, link: &mut Link) -> Result<(), NetworkError> {
        match frame.command() {
            Command::Version => {
                if self.current() >= SessionState::AwaitingVerack {
                    tracing::debug!(peer = %self.endpoint, "ignoring repeated version");
                    return Ok(());
                }
                let version: VersionPayload = frame.decode_payload()?;
                if let Some(active) = &self.active {
                    active.set(self.endpoint.clone());
                }
                link.writer.send(Command::Verack, None).await?;
                self.advance(SessionState::AwaitingVerack);
                link.peer_height = version.start_height;
                tracing::info!(
                    peer = %self.endpoint,
                    user_agent = %version.user_agent,
                    start_height = version.start_height,
                    "peer version received"
                );

                let delegate = self.delegate.clone();
                let origin = self.endpoint.clone();
                tokio::spawn(async move { delegate.on_connected(&origin, version).await });

                if link.verack_pending {
                    self.establish(link).await?;
                }
            }
            Command::Verack => match self.current() {
                SessionState::AwaitingVersion => link.verack_pending = true,
                SessionState::AwaitingVerack => self.establish(link).await?,
                state => tracing::debug!(peer = %self.endpoint, ?state, "unexpected verack"),
            },
            Command::Ping => {
                let ping: PingPayload = frame.decode_payload()?;
                link.writer
                    .send_payload(Command::Pong, &ping.reply(link.peer_height))
                    .await?;
            }
            Command::Pong => {
                let pong: PingPayload = frame.decode_payload()?;
                tracing::trace!(peer = %self.endpoint, height = pong.block_height, "pong");
            }
            Command::Inv => {
                if self.current() != SessionState::Established {
                    tracing::debug!(peer = %self.endpoint, "inv before handshake completed, ignoring");
                    return Ok(());
                }
                let inv: InventoryAnnouncement = frame.decode_payload()?;
                tracing::debug!(
                    peer = %self.endpoint,
                    kind = %inv.kind(),
                    count = inv.hashes().len(),
                    "inventory announced"
                );
                for notice in inv.notices() {
                    let delegate = self.delegate.clone();
                    let origin = self.endpoint.clone();
                    tokio::spawn(async move { delegate.on_receive(&origin, notice).await });
                }
            }
            Command::Addr => {
                let addr: AddrPayload = frame.decode_payload()?;
                tracing::debug!(peer = %self.endpoint, count = addr.addresses.len(), "peer addresses received");
            }
            other => {
                tracing::debug!(peer = %self.endpoint, command = %other, len = frame.payload.len(), "ignoring command");
            }
        }
        Ok(())
    }

    async fn establish(&self, link: &mut Link) -> Result<(), NetworkError> {
        self.advance(SessionState::Established);
        link.verack_pending = false;
        tracing::info!(peer = %self.endpoint, "peer session established");

        link.writer.send(Command::GetAddr, None).await?;
        link.pinger = Some(spawn_pinger(
            link.writer.clone(),
            self.config.ping_interval,
            link.peer_height,
            link.ping_failures.clone(),
        ));
        Ok(())
    }
}

/// Ticks every `interval`. A tick missed behind a slow write is taken once,
/// then the schedule restarts from there.
fn ping_ticker(interval: Duration) -> Interval {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Write a `ping` every `interval` until a write fails; the failure is handed
/// back to the read loop.
fn spawn_pinger(
    writer: Arc<FrameWriter>,
    interval: Duration,
    block_height: u32,
    failures: mpsc::Sender<NetworkError>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ping_ticker(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = writer.send_payload(Command::Ping, &PingPayload::new(block_height)).await {
                let _ = failures.send(e).await;
                return;
            }
        }
    })
}
