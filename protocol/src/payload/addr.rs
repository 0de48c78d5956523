use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use super::Payload;
use crate::encoding::put_var_int;
use crate::{ByteReader, ProtocolError};

/// timestamp(4) + services(8) + ip(16) + port(2)
pub const ADDRESS_RECORD_SIZE: usize = 30;

/// One peer address record. The port is big-endian on the wire, unlike
/// every other integer in the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkAddress {
    pub timestamp: u32,
    pub services: u64,
    pub ip: Ipv6Addr,
    pub port: u16,
}

impl NetworkAddress {
    /// IPv4-mapped addresses come back as plain IPv4.
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = match self.ip.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(self.ip),
        };
        SocketAddr::new(ip, self.port)
    }
}

/// Body of `addr`: a var-int count followed by that many records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddrPayload {
    pub addresses: Vec<NetworkAddress>,
}

impl Payload for AddrPayload {
    fn encode(&self, out: &mut Vec<u8>) {
        put_var_int(out, self.addresses.len() as u64);
        for addr in &self.addresses {
            out.extend_from_slice(&addr.timestamp.to_le_bytes());
            out.extend_from_slice(&addr.services.to_le_bytes());
            out.extend_from_slice(&addr.ip.octets());
            out.extend_from_slice(&addr.port.to_be_bytes());
        }
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let count = reader.read_var_int()?;
        if count > (reader.remaining() / ADDRESS_RECORD_SIZE) as u64 {
            return Err(ProtocolError::AddressCountTooLarge { count });
        }
        let mut addresses = Vec::with_capacity(count as usize);
        for _ in 0..count {
            addresses.push(NetworkAddress {
                timestamp: reader.read_u32_le()?,
                services: reader.read_u64_le()?,
                ip: Ipv6Addr::from(reader.read_array::<16>()?),
                port: reader.read_u16_be()?,
            });
        }
        Ok(Self { addresses })
    }
}
