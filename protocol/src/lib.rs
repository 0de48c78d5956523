//! Wire protocol: frame encoding/decoding, var-int primitives and the
//! payload types the watcher speaks (version, ping, inventory, address list).
//!
//! Frames are a fixed 24-byte header followed by the payload. Every decode
//! either returns a complete structure or a [`ProtocolError`]; partial
//! structures never escape.

pub mod codec;
pub mod encoding;
pub mod error;
pub mod payload;
pub mod version;

pub use codec::{
    build_frame, checksum, decode_frame, encode_message, read_frame, ChecksumPolicy, Command,
    Frame, FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use encoding::ByteReader;
pub use error::ProtocolError;
pub use payload::{
    AddrPayload, InventoryAnnouncement, NetworkAddress, Payload, PingPayload, VersionPayload,
};
pub use version::PROTOCOL_VERSION;
