//! 32-byte hashes in display order.
//!
//! Peers transmit hashes in their internal (little-endian) byte order. Every
//! [`Hash256`] held by the rest of the workspace is in display/lookup order,
//! which is the wire order reversed end-to-end. The conversion happens exactly
//! once, in [`Hash256::from_wire`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 32-byte transaction or block hash in display order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256([u8; 32]);

/// Failure to parse a [`Hash256`] from its hex form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashParseError {
    #[error("expected 64 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Hash256 {
    pub const LEN: usize = 32;
    pub const ZERO: Self = Self([0u8; 32]);

    /// Wrap bytes that are already in display order.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Convert bytes read off the wire into display order.
    pub fn from_wire(mut wire: [u8; 32]) -> Self {
        wire.reverse();
        Self(wire)
    }

    /// The bytes as they must be written to the wire.
    pub fn to_wire(&self) -> [u8; 32] {
        let mut out = self.0;
        out.reverse();
        out
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, the identifier used for RPC lookups and subscriber events.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = HashParseError;

    /// Parses display-order hex, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(HashParseError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| HashParseError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sequential() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        bytes
    }

    #[test]
    fn from_wire_reverses_byte_order() {
        let hash = Hash256::from_wire(sequential());
        assert_eq!(hash.as_bytes()[0], 0x1F);
        assert_eq!(hash.as_bytes()[31], 0x00);
        assert_eq!(
            hash.to_hex(),
            "1f1e1d1c1b1a191817161514131211100f0e0d0c0b0a09080706050403020100"
        );
    }

    #[test]
    fn to_wire_restores_original_bytes() {
        let wire = sequential();
        assert_eq!(Hash256::from_wire(wire).to_wire(), wire);
    }

    #[test]
    fn parse_accepts_prefixed_hex() {
        let hex = format!("0x{}", "ab".repeat(32));
        let hash: Hash256 = hex.parse().unwrap();
        assert_eq!(hash.as_bytes(), &[0xAB; 32]);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(
            "abcd".parse::<Hash256>(),
            Err(HashParseError::InvalidLength(4))
        );
    }

    #[test]
    fn serializes_as_hex_string() {
        let hash = Hash256::new([0x01; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    proptest! {
        #[test]
        fn hex_parse_inverts_display(bytes in any::<[u8; 32]>()) {
            let hash = Hash256::new(bytes);
            prop_assert_eq!(hash.to_string().parse::<Hash256>().unwrap(), hash);
        }
    }
}
