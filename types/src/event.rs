//! The normalized event delivered to subscribers.

use serde::{Deserialize, Serialize};

/// Well-known topic names.
pub mod topics {
    /// Enriched transaction announcements.
    pub const TX: &str = "tx";
    /// Block announcements and relayed block bodies.
    pub const BLOCK: &str = "block";
    /// Relayed contract notifications.
    pub const EVENT: &str = "event";
}

/// One message as written to a subscriber.
///
/// Serializes as `{"type": .., "txID": .., "data": ..}`; `data` is omitted
/// when absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "txID", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl WireEvent {
    /// The empty message written to idle subscribers as a liveness probe.
    pub fn keepalive() -> Self {
        Self::default()
    }

    pub fn transaction(id: impl Into<String>, detail: serde_json::Value) -> Self {
        Self {
            kind: topics::TX.to_string(),
            id: id.into(),
            data: Some(detail),
        }
    }

    pub fn block(id: impl Into<String>) -> Self {
        Self {
            kind: topics::BLOCK.to_string(),
            id: id.into(),
            data: None,
        }
    }

    pub fn relayed(kind: &str, id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.to_string(),
            id: id.into(),
            data: Some(data),
        }
    }

    pub fn to_json(&self) -> String {
        // A struct of strings and a JSON value cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}
