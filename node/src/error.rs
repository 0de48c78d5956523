use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(#[from] txtap_network::NetworkError),

    #[error("gateway error: {0}")]
    Gateway(#[from] txtap_websocket::GatewayError),

    #[error("relay error: {0}")]
    Relay(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
