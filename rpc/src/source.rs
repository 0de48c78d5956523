//! The lookup seam between ingestion and the RPC transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::RpcError;

/// Verbose `getrawtransaction` result, kept as the node returned it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionDetail(pub serde_json::Value);

impl TransactionDetail {
    /// Transaction type reported by the node, e.g. `InvocationTransaction`.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(|v| v.as_str())
    }

    pub fn txid(&self) -> Option<&str> {
        self.0.get("txid").and_then(|v| v.as_str())
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

/// Request/response lookups against a node's RPC endpoint.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn get_raw_transaction(&self, endpoint: &str, txid: &str) -> Result<TransactionDetail, RpcError>;

    async fn get_block_count(&self, endpoint: &str) -> Result<u64, RpcError>;
}
