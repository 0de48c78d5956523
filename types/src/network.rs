//! Network profiles and magic identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::PeerEndpoint;

/// The 4-byte identifier at the start of every frame header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkMagic(pub u32);

impl NetworkMagic {
    pub const MAIN: Self = Self(7_630_401);
    pub const TEST: Self = Self(1_953_787_457);
    pub const PRIVATE: Self = Self(56_753);
}

impl fmt::Debug for NetworkMagic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkMagic({})", self.0)
    }
}

impl fmt::Display for NetworkMagic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named network the watcher can attach to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// The production network.
    Main,
    /// The public test network.
    Test,
    /// A locally run private network.
    Private,
}

#[derive(Debug, Error)]
#[error("unknown network {0:?} (expected main, test or private)")]
pub struct UnknownNetwork(pub String);

impl Network {
    pub fn magic(&self) -> NetworkMagic {
        match self {
            Self::Main => NetworkMagic::MAIN,
            Self::Test => NetworkMagic::TEST,
            Self::Private => NetworkMagic::PRIVATE,
        }
    }

    /// Default P2P port for this network.
    pub fn default_p2p_port(&self) -> u16 {
        match self {
            Self::Main => 10333,
            Self::Test | Self::Private => 20333,
        }
    }

    /// Default JSON-RPC port paired with the P2P port.
    pub fn default_rpc_port(&self) -> u16 {
        match self {
            Self::Main => 10332,
            Self::Test | Self::Private => 20332,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Test => "test",
            Self::Private => "private",
        }
    }

    /// Public seed nodes with their paired RPC interfaces. Empty for private networks.
    pub fn default_seeds(&self) -> Vec<PeerEndpoint> {
        match self {
            Self::Private => Vec::new(),
            public => (1..=5)
                .map(|i| {
                    let host = format!("seed{i}.neo.org");
                    PeerEndpoint::with_rpc(
                        format!("{host}:{}", public.default_p2p_port()),
                        format!("http://{host}:{}", public.default_rpc_port()),
                    )
                })
                .collect(),
        }
    }
}

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(Self::Main),
            "test" | "testnet" => Ok(Self::Test),
            "private" | "privnet" => Ok(Self::Private),
            _ => Err(UnknownNetwork(s.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
