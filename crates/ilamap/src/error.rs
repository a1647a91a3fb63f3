//! Error types for mapping-plane operations.

use std::io;

/// Result type for mapping-plane operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during mapping-plane operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed textual address or locator.
    #[error("parse error: {0}")]
    Parse(String),

    /// Record or wire buffer has the wrong fixed size.
    #[error("bad {kind} length: expected {expected} bytes, got {actual}")]
    BadLength {
        /// What was being decoded (e.g. "map record").
        kind: &'static str,
        /// The fixed size the decoder requires.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Ticket buffer of unexpected size.
    ///
    /// The raw bytes are kept so the caller can dump them for diagnosis;
    /// the observed length is `raw.len()`.
    #[error("bad ticket length: got {} bytes", raw.len())]
    BadTicket {
        /// The bytes as received.
        raw: Vec<u8>,
    },

    /// A protocol header field had a value the peer is not allowed to send.
    #[error("unexpected {field}: {value}")]
    UnexpectedField {
        /// The field that was violated.
        field: &'static str,
        /// The value observed on the wire.
        value: u64,
    },

    /// Backend or peer unreachable, or the connection dropped mid-call.
    #[error("connection error: {0}")]
    Connection(String),

    /// Key absent on an operation that requires an existing row.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// The entity kind (e.g. "identifier").
        kind: &'static str,
        /// Textual form of the missing key.
        key: String,
    },

    /// JSON serialization error.
    #[cfg(feature = "output")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a connection error (backend or peer).
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this is a format violation (wrong buffer size or field value).
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Self::BadLength { .. } | Self::BadTicket { .. } | Self::UnexpectedField { .. }
        )
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Self::Connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::BadLength {
            kind: "map record",
            expected: 16,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "bad map record length: expected 16 bytes, got 12"
        );

        let err = Error::NotFound {
            kind: "identifier",
            key: "5".into(),
        };
        assert_eq!(err.to_string(), "identifier not found: 5");
    }

    #[test]
    fn test_bad_ticket_reports_observed_length() {
        let err = Error::BadTicket {
            raw: vec![0xde, 0xad, 0xbe, 0xef],
        };
        assert_eq!(err.to_string(), "bad ticket length: got 4 bytes");
    }

    #[test]
    fn test_classification() {
        assert!(
            Error::NotFound {
                kind: "locator",
                key: "2".into()
            }
            .is_not_found()
        );
        assert!(Error::Connection("refused".into()).is_connection());
        assert!(
            Error::UnexpectedField {
                field: "reply type",
                value: 7
            }
            .is_format()
        );
        assert!(!Error::Parse("x".into()).is_format());
    }

    #[test]
    fn test_io_error_is_connection() {
        let err: Error = io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(err.is_connection());
    }
}
