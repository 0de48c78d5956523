use thiserror::Error;
use txtap_protocol::ProtocolError;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("connect to {addr} timed out after {timeout_ms}ms")]
    ConnectTimeout { addr: String, timeout_ms: u64 },

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(ProtocolError),

    #[error("peer closed the connection")]
    ConnectionClosed,

    #[error("no peer endpoints configured")]
    NoEndpoints,
}

impl NetworkError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectTimeout { .. } | Self::Transport(_) | Self::ConnectionClosed => "transport",
            Self::Decode(_) => "decode",
            Self::NoEndpoints => "config",
        }
    }
}

impl From<ProtocolError> for NetworkError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(io) => Self::Transport(io),
            // A clean close between frames is not a protocol violation.
            ProtocolError::TruncatedHeader { got: 0, .. } => Self::ConnectionClosed,
            other => Self::Decode(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_are_classified() {
        let closed: NetworkError = ProtocolError::TruncatedHeader { got: 0, expected: 24 }.into();
        assert!(matches!(closed, NetworkError::ConnectionClosed));

        let partial: NetworkError = ProtocolError::TruncatedHeader { got: 7, expected: 24 }.into();
        assert_eq!(partial.kind(), "decode");

        let io: NetworkError =
            ProtocolError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset)).into();
        assert_eq!(io.kind(), "transport");
    }
}
