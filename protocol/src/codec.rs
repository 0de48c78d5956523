//! Frame codec: the 24-byte header, checksums, and reading whole frames off
//! a byte stream.
//!
//! Header layout (all little-endian):
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | network magic                           |
//! | 4      | 12   | command, ASCII, zero padded             |
//! | 16     | 4    | payload length                          |
//! | 20     | 4    | first 4 bytes of sha256(sha256(payload)) |

use std::fmt;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use txtap_types::NetworkMagic;

use crate::payload::Payload;
use crate::ProtocolError;

pub const HEADER_SIZE: usize = 24;
pub const COMMAND_SIZE: usize = 12;

/// Largest payload accepted from a peer.
pub const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024; // 10 MiB

/// Message command names. Anything not listed decodes to [`Command::Other`]
/// so unknown traffic can be logged and skipped.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Version,
    Verack,
    Ping,
    Pong,
    Inv,
    Addr,
    GetAddr,
    GetData,
    GetBlocks,
    GetHeaders,
    Headers,
    Block,
    Tx,
    Consensus,
    Mempool,
    FilterAdd,
    FilterClear,
    FilterLoad,
    Alert,
    MerkleBlock,
    NotFound,
    Reject,
    Other(String),
}

impl Command {
    pub fn as_str(&self) -> &str {
        match self {
            Command::Version => "version",
            Command::Verack => "verack",
            Command::Ping => "ping",
            Command::Pong => "pong",
            Command::Inv => "inv",
            Command::Addr => "addr",
            Command::GetAddr => "getaddr",
            Command::GetData => "getdata",
            Command::GetBlocks => "getblocks",
            Command::GetHeaders => "getheaders",
            Command::Headers => "headers",
            Command::Block => "block",
            Command::Tx => "tx",
            Command::Consensus => "consensus",
            Command::Mempool => "mempool",
            Command::FilterAdd => "filteradd",
            Command::FilterClear => "filterclear",
            Command::FilterLoad => "filterload",
            Command::Alert => "alert",
            Command::MerkleBlock => "merkleblock",
            Command::NotFound => "notfound",
            Command::Reject => "reject",
            Command::Other(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "version" => Command::Version,
            "verack" => Command::Verack,
            "ping" => Command::Ping,
            "pong" => Command::Pong,
            "inv" => Command::Inv,
            "addr" => Command::Addr,
            "getaddr" => Command::GetAddr,
            "getdata" => Command::GetData,
            "getblocks" => Command::GetBlocks,
            "getheaders" => Command::GetHeaders,
            "headers" => Command::Headers,
            "block" => Command::Block,
            "tx" => Command::Tx,
            "consensus" => Command::Consensus,
            "mempool" => Command::Mempool,
            "filteradd" => Command::FilterAdd,
            "filterclear" => Command::FilterClear,
            "filterload" => Command::FilterLoad,
            "alert" => Command::Alert,
            "merkleblock" => Command::MerkleBlock,
            "notfound" => Command::NotFound,
            "reject" => Command::Reject,
            other => Command::Other(other.to_string()),
        }
    }

    fn to_field(&self) -> Result<[u8; COMMAND_SIZE], ProtocolError> {
        let name = self.as_str().as_bytes();
        if name.len() > COMMAND_SIZE {
            return Err(ProtocolError::CommandTooLong(self.as_str().to_string()));
        }
        let mut field = [0u8; COMMAND_SIZE];
        field[..name.len()].copy_from_slice(name);
        Ok(field)
    }

    fn from_field(field: &[u8]) -> Self {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Self::parse(&String::from_utf8_lossy(&field[..end]))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a checksum mismatch fails the read or is only reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChecksumPolicy {
    #[default]
    Strict,
    /// Accept the frame regardless of its checksum field.
    Permissive,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: NetworkMagic,
    pub command: Command,
    pub length: u32,
    pub checksum: u32,
}

impl FrameHeader {
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Self {
            magic: NetworkMagic(u32_at(0)),
            command: Command::from_field(&bytes[4..4 + COMMAND_SIZE]),
            length: u32_at(16),
            checksum: u32_at(20),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn command(&self) -> &Command {
        &self.header.command
    }

    pub fn checksum_matches(&self) -> bool {
        checksum(&self.payload) == self.header.checksum
    }

    /// Decode the payload as `P`. Trailing bytes after the structure are
    /// ignored.
    pub fn decode_payload<P: Payload>(&self) -> Result<P, ProtocolError> {
        P::from_bytes(&self.payload)
    }
}

/// First four bytes of `sha256(sha256(payload))`, read little-endian.
pub fn checksum(payload: &[u8]) -> u32 {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    u32::from_le_bytes([second[0], second[1], second[2], second[3]])
}

/// Serialize a complete frame. An absent payload produces a zero-length
/// frame whose checksum is still computed over the empty input.
pub fn build_frame(
    magic: NetworkMagic,
    command: &Command,
    payload: Option<&[u8]>,
) -> Result<Vec<u8>, ProtocolError> {
    let payload = payload.unwrap_or(&[]);
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&magic.0.to_le_bytes());
    out.extend_from_slice(&command.to_field()?);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&checksum(payload).to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode `payload` and wrap it in a frame.
pub fn encode_message<P: Payload>(
    magic: NetworkMagic,
    command: &Command,
    payload: &P,
) -> Result<Vec<u8>, ProtocolError> {
    build_frame(magic, command, Some(&payload.to_bytes()))
}

fn check_frame(frame: &Frame, policy: ChecksumPolicy) -> Result<(), ProtocolError> {
    if policy == ChecksumPolicy::Strict && !frame.checksum_matches() {
        return Err(ProtocolError::ChecksumMismatch {
            expected: frame.header.checksum,
            actual: checksum(&frame.payload),
        });
    }
    Ok(())
}

fn check_length(length: u32) -> Result<usize, ProtocolError> {
    let length = length as usize;
    if length > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: length,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(length)
}

/// Decode one frame from the front of `buf`, returning it together with the
/// number of bytes consumed.
pub fn decode_frame(buf: &[u8], policy: ChecksumPolicy) -> Result<(Frame, usize), ProtocolError> {
    let Some(head) = buf.get(..HEADER_SIZE) else {
        return Err(ProtocolError::TruncatedHeader {
            got: buf.len(),
            expected: HEADER_SIZE,
        });
    };
    let mut header_bytes = [0u8; HEADER_SIZE];
    header_bytes.copy_from_slice(head);
    let header = FrameHeader::parse(&header_bytes);

    let length = check_length(header.length)?;
    let body = &buf[HEADER_SIZE..];
    if body.len() < length {
        return Err(ProtocolError::TruncatedPayload {
            got: body.len(),
            expected: length,
        });
    }

    let frame = Frame {
        header,
        payload: body[..length].to_vec(),
    };
    check_frame(&frame, policy)?;
    Ok((frame, HEADER_SIZE + length))
}

/// Read until `buf` is full or the stream ends; returns the bytes filled.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Read exactly one frame from a stream.
///
/// A stream that ends mid-header or mid-payload yields
/// [`ProtocolError::TruncatedHeader`] / [`ProtocolError::TruncatedPayload`];
/// other I/O failures surface as [`ProtocolError::Io`].
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    policy: ChecksumPolicy,
) -> Result<Frame, ProtocolError> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    let got = read_full(reader, &mut header_bytes).await?;
    if got < HEADER_SIZE {
        return Err(ProtocolError::TruncatedHeader {
            got,
            expected: HEADER_SIZE,
        });
    }
    let header = FrameHeader::parse(&header_bytes);

    let length = check_length(header.length)?;
    let mut payload = vec![0u8; length];
    let got = read_full(reader, &mut payload).await?;
    if got < length {
        return Err(ProtocolError::TruncatedPayload {
            got,
            expected: length,
        });
    }

    let frame = Frame { header, payload };
    check_frame(&frame, policy)?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PingPayload;

    const MAGIC: NetworkMagic = NetworkMagic::MAIN;

    #[test]
    fn empty_payload_checksum_is_well_known() {
        // sha256d("") = 5df6e0e2...
        assert_eq!(checksum(&[]), 0xE2E0F65D);
    }

    #[test]
    fn verack_frame_layout() {
        let bytes = build_frame(MAGIC, &Command::Verack, None).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], &7630401u32.to_le_bytes());
        assert_eq!(&bytes[4..10], b"verack");
        assert!(bytes[10..16].iter().all(|&b| b == 0));
        assert_eq!(&bytes[16..20], &[0, 0, 0, 0]);
        assert_eq!(&bytes[20..24], &[0x5D, 0xF6, 0xE0, 0xE2]);
    }

    #[test]
    fn frame_decodes_back() {
        let payload = vec![1u8, 2, 3, 4, 5];
        let bytes = build_frame(MAGIC, &Command::Tx, Some(&payload)).unwrap();
        let (frame, used) = decode_frame(&bytes, ChecksumPolicy::Strict).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(frame.header.magic, MAGIC);
        assert_eq!(frame.header.command, Command::Tx);
        assert_eq!(frame.header.length, 5);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn decode_stops_at_frame_boundary() {
        let mut bytes = build_frame(MAGIC, &Command::Verack, None).unwrap();
        let second = build_frame(MAGIC, &Command::GetAddr, None).unwrap();
        bytes.extend_from_slice(&second);
        let (first, used) = decode_frame(&bytes, ChecksumPolicy::Strict).unwrap();
        assert_eq!(first.header.command, Command::Verack);
        let (next, _) = decode_frame(&bytes[used..], ChecksumPolicy::Strict).unwrap();
        assert_eq!(next.header.command, Command::GetAddr);
    }

    #[test]
    fn short_header_is_truncated() {
        let err = decode_frame(&[0u8; 23], ChecksumPolicy::Strict).unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedHeader { got: 23, expected: 24 }));
    }

    #[test]
    fn short_payload_is_truncated() {
        let bytes = build_frame(MAGIC, &Command::Tx, Some(&[9u8; 10])).unwrap();
        let err = decode_frame(&bytes[..HEADER_SIZE + 4], ChecksumPolicy::Strict).unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedPayload { got: 4, expected: 10 }));
    }

    #[test]
    fn oversized_length_is_rejected_before_reading_payload() {
        let mut bytes = build_frame(MAGIC, &Command::Block, None).unwrap();
        bytes[16..20].copy_from_slice(&((MAX_PAYLOAD_SIZE as u32) + 1).to_le_bytes());
        let err = decode_frame(&bytes, ChecksumPolicy::Strict).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLarge { .. }));
    }

    #[test]
    fn checksum_policy_decides_on_mismatch() {
        let mut bytes = build_frame(MAGIC, &Command::Tx, Some(&[1, 2, 3])).unwrap();
        bytes[20] ^= 0xFF;
        let err = decode_frame(&bytes, ChecksumPolicy::Strict).unwrap_err();
        assert!(matches!(err, ProtocolError::ChecksumMismatch { .. }));

        let (frame, _) = decode_frame(&bytes, ChecksumPolicy::Permissive).unwrap();
        assert!(!frame.checksum_matches());
        assert_eq!(frame.payload, vec![1, 2, 3]);
    }

    #[test]
    fn unknown_command_survives_as_other() {
        let bytes = build_frame(MAGIC, &Command::Other("weird".into()), None).unwrap();
        let (frame, _) = decode_frame(&bytes, ChecksumPolicy::Strict).unwrap();
        assert_eq!(frame.header.command, Command::Other("weird".into()));
        assert_eq!(frame.header.command.to_string(), "weird");
    }

    #[test]
    fn overlong_command_is_refused() {
        let err = build_frame(MAGIC, &Command::Other("thirteenchars".into()), None).unwrap_err();
        assert!(matches!(err, ProtocolError::CommandTooLong(_)));
    }

    #[test]
    fn every_named_command_round_trips_through_its_name() {
        let all = [
            Command::Version, Command::Verack, Command::Ping, Command::Pong, Command::Inv,
            Command::Addr, Command::GetAddr, Command::GetData, Command::GetBlocks,
            Command::GetHeaders, Command::Headers, Command::Block, Command::Tx,
            Command::Consensus, Command::Mempool, Command::FilterAdd, Command::FilterClear,
            Command::FilterLoad, Command::Alert, Command::MerkleBlock, Command::NotFound,
            Command::Reject,
        ];
        for cmd in all {
            assert_eq!(Command::parse(cmd.as_str()), cmd);
            assert!(cmd.as_str().len() <= COMMAND_SIZE);
        }
    }

    // ---------------------------------------------------------------
    // Stream reads
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn read_frame_from_stream() {
        let ping = PingPayload {
            block_height: 7,
            timestamp: 1_700_000_000,
            nonce: 42,
        };
        let bytes = encode_message(MAGIC, &Command::Ping, &ping).unwrap();
        let mut stream: &[u8] = &bytes;
        let frame = read_frame(&mut stream, ChecksumPolicy::Strict).await.unwrap();
        assert_eq!(frame.header.command, Command::Ping);
        assert_eq!(frame.decode_payload::<PingPayload>().unwrap(), ping);
    }

    #[tokio::test]
    async fn stream_ending_mid_header_reports_count() {
        let bytes = build_frame(MAGIC, &Command::Verack, None).unwrap();
        let mut stream: &[u8] = &bytes[..10];
        let err = read_frame(&mut stream, ChecksumPolicy::Strict).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedHeader { got: 10, expected: 24 }));
    }

    #[tokio::test]
    async fn stream_ending_mid_payload_reports_count() {
        let bytes = build_frame(MAGIC, &Command::Tx, Some(&[0u8; 8])).unwrap();
        let mut stream: &[u8] = &bytes[..HEADER_SIZE + 3];
        let err = read_frame(&mut stream, ChecksumPolicy::Strict).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedPayload { got: 3, expected: 8 }));
    }
}
