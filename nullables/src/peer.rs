//! A scripted P2P peer on a localhost TCP port.
//!
//! The test drives every step: accept, handshake, announce, close. Frames the
//! watcher sends are read and their commands recorded so tests can assert on
//! what went over the wire.

use std::io;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use txtap_protocol::{
    build_frame, read_frame, ChecksumPolicy, Command, Frame, InventoryAnnouncement, Payload, ProtocolError,
    VersionPayload,
};
use txtap_types::{Hash256, InventoryType, NetworkMagic};

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

fn timed_out(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("fake peer timed out waiting for {what}"))
}

fn to_io(err: ProtocolError) -> io::Error {
    match err {
        ProtocolError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}

pub struct FakePeer {
    listener: TcpListener,
    magic: NetworkMagic,
}

impl FakePeer {
    pub async fn bind(magic: NetworkMagic) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener, magic })
    }

    /// `host:port` to configure as the watcher's P2P endpoint.
    pub fn addr(&self) -> String {
        self.listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_default()
    }

    /// Wait for the watcher to dial in.
    pub async fn accept(&self) -> io::Result<FakePeerConnection> {
        let (stream, _) = tokio::time::timeout(STEP_TIMEOUT, self.listener.accept())
            .await
            .map_err(|_| timed_out("a connection"))??;
        Ok(FakePeerConnection {
            stream,
            magic: self.magic,
            received: Vec::new(),
        })
    }
}

pub struct FakePeerConnection {
    stream: TcpStream,
    magic: NetworkMagic,
    received: Vec<Command>,
}

impl FakePeerConnection {
    pub async fn send_frame(&mut self, command: Command, payload: Option<&[u8]>) -> io::Result<()> {
        let bytes = build_frame(self.magic, &command, payload).map_err(to_io)?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await
    }

    pub async fn send<P: Payload>(&mut self, command: Command, payload: &P) -> io::Result<()> {
        self.send_frame(command, Some(&payload.to_bytes())).await
    }

    /// Write raw bytes, e.g. a deliberately corrupted frame.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Next frame from the watcher.
    pub async fn read(&mut self) -> io::Result<Frame> {
        let frame = tokio::time::timeout(STEP_TIMEOUT, read_frame(&mut self.stream, ChecksumPolicy::Strict))
            .await
            .map_err(|_| timed_out("a frame"))?
            .map_err(to_io)?;
        self.received.push(frame.header.command.clone());
        Ok(frame)
    }

    /// Read frames until one carries `command`.
    pub async fn expect(&mut self, command: Command) -> io::Result<Frame> {
        loop {
            let frame = self.read().await?;
            if frame.header.command == command {
                return Ok(frame);
            }
        }
    }

    /// Play the peer side of the handshake: take the watcher's `version`,
    /// answer with our own and a `verack`, then wait for the watcher's
    /// `verack`. Returns the watcher's version.
    pub async fn handshake(&mut self, start_height: u32) -> io::Result<VersionPayload> {
        let theirs = self.expect(Command::Version).await?;
        let theirs: VersionPayload = theirs.decode_payload().map_err(to_io)?;

        let mut ours = VersionPayload::local(20333, "/fake-peer:0.1/");
        ours.start_height = start_height;
        self.send(Command::Version, &ours).await?;
        self.send_frame(Command::Verack, None).await?;
        self.expect(Command::Verack).await?;
        Ok(theirs)
    }

    /// Announce `hashes` (display order) in one `inv` frame.
    pub async fn announce(&mut self, kind: InventoryType, hashes: Vec<Hash256>) -> io::Result<()> {
        let inv = InventoryAnnouncement::new(kind, hashes).map_err(to_io)?;
        self.send(Command::Inv, &inv).await
    }

    /// Commands of every frame read so far.
    pub fn received_commands(&self) -> &[Command] {
        &self.received
    }

    pub async fn close(mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plays_peer_side_of_handshake() {
        let magic = NetworkMagic::TEST;
        let peer = FakePeer::bind(magic).await.unwrap();
        let addr = peer.addr();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let ours = VersionPayload::local(1, "/client/");
            let frame = build_frame(magic, &Command::Version, Some(&ours.to_bytes())).unwrap();
            stream.write_all(&frame).await.unwrap();

            let theirs = read_frame(&mut stream, ChecksumPolicy::Strict).await.unwrap();
            assert_eq!(theirs.header.command, Command::Version);
            assert_eq!(theirs.header.magic, magic);
            let version: VersionPayload = theirs.decode_payload().unwrap();
            assert_eq!(version.start_height, 77);

            let ack = read_frame(&mut stream, ChecksumPolicy::Strict).await.unwrap();
            assert_eq!(ack.header.command, Command::Verack);
            let frame = build_frame(magic, &Command::Verack, None).unwrap();
            stream.write_all(&frame).await.unwrap();
            stream
        });

        let mut conn = peer.accept().await.unwrap();
        let theirs = conn.handshake(77).await.unwrap();
        assert_eq!(theirs.user_agent, "/client/");
        assert_eq!(conn.received_commands(), &[Command::Version, Command::Verack]);
        client.await.unwrap();
    }
}
