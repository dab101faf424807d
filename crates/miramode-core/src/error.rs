//! Error types for miramode-core.
//!
//! This module defines all error types that can occur when talking to a
//! Mira Mode controller, from link-level Bluetooth failures up to
//! protocol-level rejections reported by the device.
//!
//! # Error Recovery Strategies
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::Timeout`] | Retry | Response lost or BLE congestion |
//! | [`Error::Bluetooth`] | Retry, then reconnect | May be transient or connection lost |
//! | [`Error::NotConnected`] | Reconnect | Connection was lost |
//! | [`Error::ConnectionFailed`] | Retry with backoff | Controller may be busy with another client |
//! | [`Error::WriteFailed`] | Retry | BLE writes can fail transiently |
//! | [`Error::InvalidData`] | Do not retry | Device sent text that is not UTF-8 |
//! | [`Error::DeviceNotFound`] | Do not retry | Out of range or wrong name |
//! | [`Error::NotPaired`] | Do not retry | Pair a client first |
//! | [`Error::CommandFailed`] | Do not retry | Device rejected the request, usually bad credentials |
//! | [`Error::UnknownStatus`] | Do not retry | Firmware speaks a status this client does not know |
//! | [`Error::InvalidArgument`] | Do not retry | Fix the request |
//! | [`Error::InvalidConfig`] | Do not retry | Fix configuration and restart |
//!
//! Use [`crate::RetryConfig`] with [`crate::with_retry`] for the retryable
//! cases; [`crate::Device::connect_with_retry`] already does this for
//! connection setup.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when communicating with Mira Mode controllers.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Device not found during scan or connection.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Operation attempted while not connected to device.
    #[error("Not connected to device")]
    NotConnected,

    /// Required BLE characteristic not found on device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// Failed to decode data received from device.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Operation was cancelled, e.g. the session was closed while waiting.
    #[error("Operation cancelled")]
    Cancelled,

    /// Connection failed with specific reason.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// The device identifier that failed to connect.
        device_id: Option<String>,
        /// The structured reason for the failure.
        reason: ConnectionFailureReason,
    },

    /// Write operation failed.
    #[error("Write failed to characteristic {uuid}: {reason}")]
    WriteFailed {
        /// The characteristic UUID.
        uuid: String,
        /// The reason for the failure.
        reason: String,
    },

    /// A request argument was rejected before anything was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The request needs a paired client identity and none is set.
    #[error("No client identity set; pair a client first")]
    NotPaired,

    /// The device answered with the failure status.
    #[error("Device rejected '{operation}'")]
    CommandFailed {
        /// The request that was rejected.
        operation: String,
    },

    /// The device answered with a status byte that is neither success nor failure.
    #[error("Unknown status 0x{0:02X} from device")]
    UnknownStatus(u8),

    /// The device answered with a different kind of notification than the request expects.
    #[error("Unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        /// Event kind the request expects.
        expected: &'static str,
        /// Event kind actually received.
        actual: &'static str,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Structured reasons for connection failures.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionFailureReason {
    /// Bluetooth adapter not available or powered off.
    AdapterUnavailable,
    /// Connection attempt timed out.
    Timeout,
    /// The BLE stack refused the connection.
    BleError(String),
}

impl std::fmt::Display for ConnectionFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdapterUnavailable => write!(f, "Bluetooth adapter unavailable"),
            Self::Timeout => write!(f, "connection timed out"),
            Self::BleError(msg) => write!(f, "BLE error: {}", msg),
        }
    }
}

/// Reason why a device was not found.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// Device with specified name/address not found.
    NotFound { identifier: String },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a command failure for the named request.
    pub fn command_failed(operation: impl Into<String>) -> Self {
        Self::CommandFailed {
            operation: operation.into(),
        }
    }

    /// Create a connection failure with structured reason.
    pub fn connection_failed(device_id: Option<String>, reason: ConnectionFailureReason) -> Self {
        Self::ConnectionFailed { device_id, reason }
    }
}

impl From<miramode_types::ParseError> for Error {
    fn from(err: miramode_types::ParseError) -> Self {
        match err {
            miramode_types::ParseError::InvalidClientId(id) => {
                Error::InvalidArgument(format!("invalid client id {}", id))
            }
            miramode_types::ParseError::InvalidValue(msg) => Error::InvalidData(msg),
            // Handle future ParseError variants (non_exhaustive)
            _ => Error::InvalidData(err.to_string()),
        }
    }
}

/// Result type alias using miramode-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
