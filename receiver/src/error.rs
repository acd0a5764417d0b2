//! Error types for VIRTA

use crate::ingest::IngesterState;
use thiserror::Error;

/// Result type alias for VIRTA operations
pub type Result<T> = std::result::Result<T, VirtaError>;

/// Main error type for VIRTA
#[derive(Error, Debug)]
pub enum VirtaError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Lifecycle misuse (e.g. `start()` called twice)
    #[error("invalid ingester state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        expected: IngesterState,
        actual: IngesterState,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Error raised inside one run of the receive loop.
///
/// Every variant is retryable; the loop turns it into a restart request.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Remote endpoint refused the connection
    #[error("connection refused by {target}: {source}")]
    ConnectionRefused {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other failure while establishing the connection
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Decoder failed while pulling the next record
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl IngestError {
    /// Classify a connect-time I/O error.
    pub fn from_connect(target: impl Into<String>, source: std::io::Error) -> Self {
        let target = target.into();
        if source.kind() == std::io::ErrorKind::ConnectionRefused {
            IngestError::ConnectionRefused { target, source }
        } else {
            IngestError::Connect { target, source }
        }
    }

    /// Whether the remote side refused the connection
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, IngestError::ConnectionRefused { .. })
    }
}

/// Error produced while decoding a byte stream into records
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Bytes of a record were not valid UTF-8
    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    /// A line exceeded the configured maximum length
    #[error("line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },

    /// Underlying read failed (reset, broken pipe, timeout, ...)
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// Format-specific decode failure raised by a custom decoder
    #[error("malformed record: {0}")]
    Malformed(String),
}
