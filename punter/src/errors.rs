use thiserror::Error;

/// The error type for reading a single frame off a byte stream.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("stream closed before a frame started")]
    Closed,
    #[error("invalid length prefix {prefix:?}")]
    BadPrefix { prefix: String },
    #[error("stream closed after {read} of {expected} payload bytes")]
    Truncated { expected: usize, read: usize },
    #[error("payload is not valid JSON")]
    Json(#[source] serde_json::Error),
    #[error("I/O error while reading a frame")]
    Io(#[from] std::io::Error),
}

/// A well-framed message that does not fit the protocol.
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    #[error("message is not a JSON object: {0}")]
    NotAnObject(String),
    #[error("message has no recognised key: {0}")]
    UnknownMessage(String),
    #[error("malformed {kind} message")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("expected a {expected} message, got {got}")]
    Unexpected {
        expected: &'static str,
        got: &'static str,
    },
}

/// The error type for [`read_message`](crate::read_message).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
}
