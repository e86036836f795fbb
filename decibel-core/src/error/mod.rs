//! Error types and handling framework.
//!
//! The SDK's errors are grouped by where they originate:
//! - `DecibelError` - Top-level error type
//!   - `NetworkError` - Connection failures; retried by the subscription manager
//!   - `ProtocolError` - Malformed or unrecognized inbound messages; dropped
//!   - `CallbackError` - Failures raised by caller callbacks; isolated per callback
//!   - `SubscriptionError` - Operations rejected by a closed manager
//!   - `ConfigError` - Configuration loading and validation errors
//!   - `AddressError` - Account address parsing errors
//!   - `ValidationError` - Rejected topic and stream parameters
//!
//! # Example
//!
//! ```
//! use decibel_core::error::{DecibelError, NetworkError};
//!
//! let error: DecibelError = NetworkError::Timeout { timeout_ms: 5000 }.into();
//! assert!(error.is_recoverable());
//! assert_eq!(error.category(), "network");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::ValidationError;

/// Error severity levels for categorizing errors.
///
/// - `Fatal`: the operation cannot succeed without caller intervention
/// - `Recoverable`: can be retried or is recovered internally
/// - `Warning`: logged and dropped, operation continues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Unrecoverable error requiring caller attention.
    Fatal,

    /// Error that can be recovered from through retry.
    #[default]
    Recoverable,

    /// Non-critical issue that is logged but doesn't prevent operation.
    Warning,
}

impl ErrorSeverity {
    /// Returns true if this error is recoverable (not fatal).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }

    /// Returns true if this error is fatal (unrecoverable).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }

    /// Returns the severity as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Recoverable => "RECOVERABLE",
            Self::Warning => "WARNING",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

mod address;
mod callback;
mod config;
mod network;
mod protocol;
mod subscription;

pub use address::AddressError;
pub use callback::CallbackError;
pub use config::ConfigError;
pub use network::NetworkError;
pub use protocol::ProtocolError;
pub use subscription::SubscriptionError;

/// Top-level error type for the Decibel SDK.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecibelError {
    /// Connection-level error.
    #[error("{0}")]
    Network(#[from] NetworkError),

    /// Inbound message could not be interpreted.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// A caller callback failed.
    #[error("{0}")]
    Callback(#[from] CallbackError),

    /// Subscription operation rejected.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Address parsing error.
    #[error("{0}")]
    Address(#[from] AddressError),

    /// Topic or stream parameter validation error.
    #[error("[Validation] {0}")]
    Validation(#[from] ValidationError),
}

impl DecibelError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Network(e) => e.severity(),
            Self::Protocol(_) | Self::Callback(_) => ErrorSeverity::Warning,
            Self::Subscription(e) => e.severity(),
            Self::Config(_) | Self::Address(_) | Self::Validation(_) => ErrorSeverity::Fatal,
        }
    }

    /// Returns true if this error is recoverable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.severity().is_recoverable()
    }

    /// Returns the error category as a string.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Protocol(_) => "protocol",
            Self::Callback(_) => "callback",
            Self::Subscription(_) => "subscription",
            Self::Config(_) => "config",
            Self::Address(_) => "address",
            Self::Validation(_) => "validation",
        }
    }

    /// Returns the inner network error, if this is a network error.
    #[must_use]
    pub fn as_network_error(&self) -> Option<&NetworkError> {
        match self {
            Self::Network(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the inner callback error, if this is a callback error.
    #[must_use]
    pub fn as_callback_error(&self) -> Option<&CallbackError> {
        match self {
            Self::Callback(e) => Some(e),
            _ => None,
        }
    }
}

/// A specialized Result type for Decibel operations.
pub type Result<T> = std::result::Result<T, DecibelError>;
