//! JSON-RPC 2.0 over HTTP POST.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{RpcError, TransactionDetail, TransactionSource};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Stateless client; the endpoint is chosen per call.
pub struct RpcClient {
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            next_id: AtomicU64::new(1),
        }
    }

    /// Call `method` on `endpoint` and decode its `result`.
    pub async fn call<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: &str,
        params: Value,
    ) -> Result<R, RpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .http_client
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Unreachable(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    RpcError::Unreachable(format!("connection failed: {e}"))
                } else {
                    RpcError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(RpcError::RequestFailed(format!("HTTP status {}", response.status())));
        }

        let body: RpcResponse<R> = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(format!("failed to parse {method} response: {e}")))?;

        if let Some(err) = body.error {
            return Err(RpcError::Remote {
                code: err.code,
                message: err.message,
            });
        }
        body.result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method} response has neither result nor error")))
    }
}

impl Default for RpcClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionSource for RpcClient {
    async fn get_raw_transaction(&self, endpoint: &str, txid: &str) -> Result<TransactionDetail, RpcError> {
        self.call(endpoint, "getrawtransaction", json!([txid, 1])).await
    }

    async fn get_block_count(&self, endpoint: &str) -> Result<u64, RpcError> {
        self.call(endpoint, "getblockcount", json!([])).await
    }
}
