use thiserror::Error;

/// Decode-class failures. Any of these is fatal to the session whose stream
/// produced it.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("truncated header: got {got} of {expected} bytes")]
    TruncatedHeader { got: usize, expected: usize },

    #[error("truncated payload: got {got} of {expected} bytes")]
    TruncatedPayload { got: usize, expected: usize },

    #[error("payload too large: {size} > {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("checksum mismatch: header says {expected:08x}, payload hashes to {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("unexpected end of payload: needed {needed} bytes, {remaining} left")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("malformed var-int with prefix 0x{prefix:02x}")]
    MalformedVarInt { prefix: u8 },

    #[error("string too long: {len} > {max}")]
    StringTooLong { len: u64, max: usize },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("address count {count} exceeds what the payload can hold")]
    AddressCountTooLarge { count: u64 },

    #[error("too many inventory items: {count} > {max}")]
    TooManyItems { count: usize, max: usize },

    #[error("command {0:?} does not fit in 12 bytes")]
    CommandTooLong(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
