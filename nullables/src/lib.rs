//! Nullable infrastructure for deterministic testing.
//!
//! The watcher has two outside collaborators: a node's JSON-RPC endpoint and
//! a P2P peer. This crate provides controllable stand-ins for both:
//! - [`NullTransactionSource`] answers lookups from a script and records calls
//! - [`FakePeer`] is a real localhost TCP listener that speaks the wire
//!   protocol step by step under test control

pub mod peer;
pub mod rpc;

pub use peer::{FakePeer, FakePeerConnection};
pub use rpc::NullTransactionSource;
