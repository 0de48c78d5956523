//! Fundamental types for txtap.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! display-order hashes, inventory kinds, network profiles, peer endpoints and
//! the normalized event shape delivered to subscribers.

pub mod endpoint;
pub mod event;
pub mod hash;
pub mod inventory;
pub mod network;
pub mod time;

pub use endpoint::PeerEndpoint;
pub use event::{topics, WireEvent};
pub use hash::{Hash256, HashParseError};
pub use inventory::{InventoryNotice, InventoryType};
pub use network::{Network, NetworkMagic, UnknownNetwork};
pub use time::unix_now_secs;
