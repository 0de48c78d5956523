use thiserror::Error;

/// Lookup-class failures. Never fatal to a peer session.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("rpc error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("no rpc endpoint available")]
    NoEndpoint,
}
