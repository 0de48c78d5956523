use txtap_types::unix_now_secs;

use super::Payload;
use crate::{ByteReader, ProtocolError};

/// Body of both `ping` and `pong`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PingPayload {
    pub block_height: u32,
    pub timestamp: u32,
    pub nonce: u32,
}

impl PingPayload {
    /// A fresh ping stamped with the current time and a random nonce.
    pub fn new(block_height: u32) -> Self {
        Self {
            block_height,
            timestamp: unix_now_secs() as u32,
            nonce: rand::random(),
        }
    }

    /// The pong answering this ping: same nonce, our own height and clock.
    pub fn reply(&self, block_height: u32) -> Self {
        Self {
            block_height,
            timestamp: unix_now_secs() as u32,
            nonce: self.nonce,
        }
    }
}

impl Payload for PingPayload {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.block_height.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            block_height: reader.read_u32_le()?,
            timestamp: reader.read_u32_le()?,
            nonce: reader.read_u32_le()?,
        })
    }
}
