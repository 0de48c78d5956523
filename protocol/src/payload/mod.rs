//! Typed payloads carried inside frames.

mod addr;
mod inventory;
mod ping;
mod version;

pub use addr::{AddrPayload, NetworkAddress, ADDRESS_RECORD_SIZE};
pub use inventory::{InventoryAnnouncement, MAX_INVENTORY_ITEMS};
pub use ping::PingPayload;
pub use version::VersionPayload;

use crate::{ByteReader, ProtocolError};

/// A structure with a fixed binary layout inside a frame payload.
pub trait Payload: Sized {
    fn encode(&self, out: &mut Vec<u8>);

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::decode(&mut ByteReader::new(bytes))
    }
}
