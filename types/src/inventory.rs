//! Inventory kinds and per-hash notices.

use std::fmt;

use crate::Hash256;

/// The content type of an inventory announcement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InventoryType {
    /// A transaction (`0x01`).
    Transaction,
    /// A block (`0x02`).
    Block,
    /// Consensus data (`0xe0`). Never surfaced to subscribers.
    Consensus,
    /// Any other type byte, kept as received.
    Unknown(u8),
}

impl InventoryType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x01 => Self::Transaction,
            0x02 => Self::Block,
            0xe0 => Self::Consensus,
            other => Self::Unknown(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Transaction => 0x01,
            Self::Block => 0x02,
            Self::Consensus => 0xe0,
            Self::Unknown(b) => *b,
        }
    }

    /// Short name, also used as the topic for this kind of announcement.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transaction => "tx",
            Self::Block => "block",
            Self::Consensus => "consensus",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for InventoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(b) => write!(f, "unknown(0x{b:02x})"),
            known => f.write_str(known.as_str()),
        }
    }
}

/// One hash taken out of an `inv` frame.
///
/// A frame announcing N hashes produces N notices, each dispatched on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InventoryNotice {
    pub kind: InventoryType,
    pub hash: Hash256,
}

impl InventoryNotice {
    pub fn new(kind: InventoryType, hash: Hash256) -> Self {
        Self { kind, hash }
    }

    /// Hex identifier of the announced transaction or block.
    pub fn id(&self) -> String {
        self.hash.to_hex()
    }
}
