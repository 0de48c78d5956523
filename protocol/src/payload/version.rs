use txtap_types::unix_now_secs;

use super::Payload;
use crate::encoding::put_var_string;
use crate::version::{DEFAULT_SERVICES, MAX_USER_AGENT_LENGTH, PROTOCOL_VERSION};
use crate::{ByteReader, ProtocolError};

/// The handshake announcement each side sends first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionPayload {
    pub version: u32,
    pub services: u64,
    pub timestamp: u32,
    pub port: u16,
    pub nonce: u32,
    pub user_agent: String,
    pub start_height: u32,
    pub relay: bool,
}

impl VersionPayload {
    /// Our own announcement: default version and services, current time,
    /// a random nonce, height zero, relay on.
    pub fn local(port: u16, user_agent: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            services: DEFAULT_SERVICES,
            timestamp: unix_now_secs() as u32,
            port,
            nonce: rand::random(),
            user_agent: user_agent.into(),
            start_height: 0,
            relay: true,
        }
    }
}

impl Payload for VersionPayload {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.port.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        put_var_string(out, &self.user_agent);
        out.extend_from_slice(&self.start_height.to_le_bytes());
        out.push(u8::from(self.relay));
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            version: reader.read_u32_le()?,
            services: reader.read_u64_le()?,
            timestamp: reader.read_u32_le()?,
            port: reader.read_u16_le()?,
            nonce: reader.read_u32_le()?,
            user_agent: reader.read_var_string(MAX_USER_AGENT_LENGTH)?,
            start_height: reader.read_u32_le()?,
            relay: reader.read_bool()?,
        })
    }
}
