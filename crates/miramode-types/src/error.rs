//! Error types for data parsing in miramode-types.

use thiserror::Error;

/// Errors that can occur when decoding Mira Mode protocol data.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in miramode-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A text field in a payload was not valid UTF-8.
    #[error("Invalid UTF-8 in {field}: {source}")]
    InvalidUtf8 {
        /// The payload field being decoded.
        field: &'static str,
        /// The underlying decoding failure.
        source: std::str::Utf8Error,
    },

    /// Payload did not have the number of bytes its layout requires.
    #[error("Insufficient bytes: expected {expected}, got {actual}")]
    InsufficientBytes {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes received.
        actual: usize,
    },

    /// Client id is zero or collides with the pairing salt.
    #[error("Invalid client id {0}: must be in 1..2^32 and differ from the pairing magic")]
    InvalidClientId(u32),

    /// Generic invalid value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias using miramode-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
