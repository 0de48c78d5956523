//! WebSocket gateway for external subscribers.
//!
//! Clients connect to `/` or `/ws` and pick a topic with `?channel=<topic>`
//! (or `?type=<topic>`). Every event the hub delivers for that topic is
//! written as one JSON text frame; an empty keep-alive message goes out on a
//! fixed period. The first failed or timed-out write ends the connection and
//! its subscription.

pub mod error;
pub mod gateway;
pub mod stats;

pub use error::GatewayError;
pub use gateway::{router, serve, GatewayConfig, GatewayState};
pub use stats::{GatewayStats, StatsSnapshot};
