use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Bad magic 0x{actual:08x} (expected 0x{expected:08x}).")]
    BadMagic { expected: u32, actual: u32 },
    #[error("Incomplete frame: need {needed} bytes, have {available}.")]
    Incomplete { needed: usize, available: usize },
    #[error("Truncated payload: need {needed} more bytes, have {available}.")]
    TruncatedPayload { needed: usize, available: usize },
    #[error("Frame exceeded max size ({max_bytes} bytes, got {actual}).")]
    FrameTooLarge { max_bytes: usize, actual: usize },
    #[error("Unknown operation kind {code}.")]
    UnknownOperationKind { code: u16 },
    #[error("Unknown response type {code}.")]
    UnknownResponseType { code: u16 },
    #[error("Invalid address level {level} in frame.")]
    InvalidAddressLevel { level: u8 },
    #[error("Malformed {kind} body: {source}")]
    MalformedBody {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode {kind} body: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Connection closed.")]
    ConnectionClosed,
    #[error("I/O error during {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}
