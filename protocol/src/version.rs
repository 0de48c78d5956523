//! Protocol constants announced in our `version` payload.

/// Protocol version we announce.
pub const PROTOCOL_VERSION: u32 = 0;

/// Service flags we announce (full node bit).
pub const DEFAULT_SERVICES: u64 = 1;

/// Longest user agent accepted from a peer.
pub const MAX_USER_AGENT_LENGTH: usize = 1024;

/// User agent announced when none is configured. Peers on the watched
/// network expect a reference-client style string.
pub const DEFAULT_USER_AGENT: &str = "/Neo:2.10.2/";
