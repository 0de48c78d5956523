//! The txtap watcher.
//!
//! Ties the networking, hub, RPC and gateway crates together:
//! - [`IngestionAdapter`] receives peer announcements, enriches transactions
//!   over RPC and publishes to the hub
//! - [`RelayFeed`] republishes an optional upstream relay's events
//! - [`Watcher`] runs the connection manager, the relay feed, the
//!   subscriber gateway and the stats reporter until shutdown

pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod relay;
pub mod shutdown;
pub mod watcher;

pub use config::WatcherConfig;
pub use error::NodeError;
pub use ingest::{EventSink, IngestionAdapter};
pub use logging::{init_logging, LogFormat};
pub use metrics::WatcherMetrics;
pub use relay::{route_envelope, RelayFeed};
pub use shutdown::ShutdownController;
pub use watcher::Watcher;
