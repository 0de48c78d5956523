//! JSON-RPC client side of txtap.
//!
//! The watcher only needs two calls: `getrawtransaction` to enrich a
//! transaction announcement and `getblockcount` to rank fallback nodes.

pub mod client;
pub mod error;
pub mod select;
pub mod source;

pub use client::RpcClient;
pub use error::RpcError;
pub use select::{select_best_node, BestNode};
pub use source::{TransactionDetail, TransactionSource};
