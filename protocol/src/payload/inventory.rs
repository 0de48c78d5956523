use txtap_types::{Hash256, InventoryNotice, InventoryType};

use super::Payload;
use crate::{ByteReader, ProtocolError};

/// The count field is a single byte.
pub const MAX_INVENTORY_ITEMS: usize = 255;

/// An `inv` (or `getdata`) body: one type byte, a one-byte count, then that
/// many 32-byte hashes in wire order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryAnnouncement {
    kind: InventoryType,
    hashes: Vec<Hash256>,
}

impl InventoryAnnouncement {
    pub fn new(kind: InventoryType, hashes: Vec<Hash256>) -> Result<Self, ProtocolError> {
        if hashes.len() > MAX_INVENTORY_ITEMS {
            return Err(ProtocolError::TooManyItems {
                count: hashes.len(),
                max: MAX_INVENTORY_ITEMS,
            });
        }
        Ok(Self { kind, hashes })
    }

    pub fn kind(&self) -> InventoryType {
        self.kind
    }

    /// Hashes in display order.
    pub fn hashes(&self) -> &[Hash256] {
        &self.hashes
    }

    /// One notice per announced hash, in frame order.
    pub fn notices(&self) -> impl Iterator<Item = InventoryNotice> + '_ {
        self.hashes
            .iter()
            .map(move |hash| InventoryNotice::new(self.kind, *hash))
    }
}

impl Payload for InventoryAnnouncement {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.kind.as_byte());
        out.push(self.hashes.len() as u8);
        for hash in &self.hashes {
            out.extend_from_slice(&hash.to_wire());
        }
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let kind = InventoryType::from_byte(reader.read_u8()?);
        let count = reader.read_u8()? as usize;
        let mut hashes = Vec::with_capacity(count);
        for _ in 0..count {
            hashes.push(Hash256::from_wire(reader.read_array()?));
        }
        Ok(Self { kind, hashes })
    }
}
