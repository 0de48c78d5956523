//! Nullable RPC source: scripted answers, recorded calls.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use txtap_rpc::{RpcError, TransactionDetail, TransactionSource};

#[derive(Default)]
pub struct NullTransactionSource {
    transactions: Mutex<HashMap<String, Value>>,
    heights: Mutex<HashMap<String, u64>>,
    down: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl NullTransactionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `getrawtransaction(txid)` with `detail` on every endpoint.
    pub fn with_transaction(self, txid: &str, detail: Value) -> Self {
        lock(&self.transactions).insert(txid.to_string(), detail);
        self
    }

    /// Answer `getblockcount` on `endpoint` with `height`.
    pub fn with_block_count(self, endpoint: &str, height: u64) -> Self {
        lock(&self.heights).insert(endpoint.to_string(), height);
        self
    }

    /// Make every call against `endpoint` fail as unreachable.
    pub fn with_endpoint_down(self, endpoint: &str) -> Self {
        lock(&self.down).insert(endpoint.to_string());
        self
    }

    /// `(endpoint, txid)` of every transaction lookup so far, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }

    pub fn lookups_for(&self, txid: &str) -> usize {
        lock(&self.calls).iter().filter(|(_, t)| t == txid).count()
    }

    fn check_up(&self, endpoint: &str) -> Result<(), RpcError> {
        if lock(&self.down).contains(endpoint) {
            return Err(RpcError::Unreachable(format!("{endpoint} is down")));
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl TransactionSource for NullTransactionSource {
    async fn get_raw_transaction(&self, endpoint: &str, txid: &str) -> Result<TransactionDetail, RpcError> {
        lock(&self.calls).push((endpoint.to_string(), txid.to_string()));
        self.check_up(endpoint)?;
        lock(&self.transactions)
            .get(txid)
            .cloned()
            .map(TransactionDetail)
            .ok_or_else(|| RpcError::Remote {
                code: -100,
                message: "Unknown transaction".to_string(),
            })
    }

    async fn get_block_count(&self, endpoint: &str) -> Result<u64, RpcError> {
        self.check_up(endpoint)?;
        lock(&self.heights)
            .get(endpoint)
            .copied()
            .ok_or_else(|| RpcError::Unreachable(endpoint.to_string()))
    }
}
