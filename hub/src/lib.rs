//! Topic-keyed publish/subscribe broker.
//!
//! Each subscriber owns a bounded channel. [`EventHub::publish`] never waits:
//! a subscriber whose channel is full simply misses that message. The
//! registry lock is held only while copying or editing a topic's subscriber
//! list, never across a send.

mod hub;

pub use hub::{EventHub, PublishOutcome, Subscription, SubscriptionId, DEFAULT_CAPACITY};
