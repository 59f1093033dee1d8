//! Error types for the BITS server
//!
//! `BitsError` covers every request-time outcome and knows how it is
//! rendered on the wire. `ConfigError` is only produced while building the
//! handler or loading configuration and never reaches a client.

use axum::http::StatusCode;
use thiserror::Error;

use crate::bits::range::RangeError;

/// Result type for request handling
pub type Result<T> = std::result::Result<T, BitsError>;

// ============================================================================
// Error Context
// ============================================================================

/// Value of the `BITS-Error-Context` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorContext {
    None = 0,
    Unknown = 1,
    GeneralQueueManager = 2,
    QueueManagerNotification = 3,
    LocalFile = 4,
    RemoteFile = 5,
    GeneralTransport = 6,
    RemoteApplication = 7,
}

impl ErrorContext {
    /// Lower-case hex rendering used on the wire
    pub fn to_hex(self) -> String {
        format!("{:x}", self as u8)
    }
}

// ============================================================================
// Request Errors
// ============================================================================

/// Every way a BITS packet can fail
#[derive(Debug, Error)]
pub enum BitsError {
    #[error("Unknown packet type: {0:?}")]
    UnknownPacketType(String),

    #[error("Missing session id")]
    MissingSessionId,

    #[error("Invalid session: {0}")]
    SessionNotFound(String),

    #[error("No supported protocol in {0:?}")]
    ProtocolMismatch(Vec<String>),

    #[error("Filename not permitted: {0:?}")]
    FilenameRejected(String),

    #[error("Invalid content-range: {0}")]
    InvalidRange(#[from] RangeError),

    #[error("Invalid content-length: {0:?}")]
    InvalidContentLength(String),

    #[error("Payload is {received} bytes but content-length declared {declared}")]
    PayloadLengthMismatch { declared: u64, received: u64 },

    #[error("Payload unreadable within content-length {declared}: {reason}")]
    PayloadUnreadable { declared: u64, reason: String },

    #[error("Range covers {range_len} bytes but content-length declared {declared}")]
    RangeLengthMismatch { range_len: u64, declared: u64 },

    #[error("Range end {end} is not below total length {total}")]
    RangeBeyondTotal { end: u64, total: u64 },

    #[error("Declared total {declared} differs from earlier total {expected}")]
    TotalMismatch { declared: u64, expected: u64 },

    #[error("Declared total {total} is below the {received} bytes already received")]
    TotalBelowReceived { total: u64, received: u64 },

    #[error("File too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Range already written to disk (received {received} bytes)")]
    AlreadyReceived { received: u64 },

    #[error("Range starts past received data (received {received} bytes)")]
    RangeGap { received: u64 },

    #[error("Failed to generate session id: {0}")]
    RandomSource(#[from] rand::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Short write: wrote {written} of {expected} bytes")]
    ShortWrite { expected: u64, written: u64 },
}

impl BitsError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::AlreadyReceived { .. } | Self::RangeGap { .. } => {
                StatusCode::RANGE_NOT_SATISFIABLE
            }
            Self::RandomSource(_) | Self::Io(_) | Self::ShortWrite { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Value for `BITS-Error-Context`
    ///
    /// The protocol offers nothing finer than the remote file context for
    /// either client or server failures.
    pub fn context(&self) -> ErrorContext {
        ErrorContext::RemoteFile
    }

    /// Value for `BITS-Error-Code`
    pub fn code(&self) -> u32 {
        0
    }

    /// Frontier to report back so the client can resynchronize
    pub fn received(&self) -> Option<u64> {
        match self {
            Self::AlreadyReceived { received } | Self::RangeGap { received } => Some(*received),
            _ => None,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Errors raised while building configuration or the handler
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to compile regexp {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Failed to prepare temp directory: {0}")]
    TempDir(#[from] std::io::Error),
}
