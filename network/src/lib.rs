//! P2P networking layer for txtap.
//!
//! A [`PeerSession`] owns one TCP connection, drives the version/verack
//! handshake and keep-alives, and turns `inv` frames into per-hash
//! notifications for a [`SessionDelegate`]. The [`ConnectionManager`] keeps
//! exactly one session alive, failing over across the configured endpoints
//! with capped exponential backoff.

pub mod active;
pub mod backoff;
pub mod error;
pub mod manager;
pub mod session;

pub use active::ActivePeer;
pub use backoff::{Backoff, BackoffPolicy};
pub use error::NetworkError;
pub use manager::{ConnectionManager, EndpointRotation};
pub use session::{PeerSession, SessionConfig, SessionDelegate, SessionOutcome, SessionState};
