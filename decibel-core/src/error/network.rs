//! Network-related error types.
//!
//! Connection failures, timeouts and WebSocket transport errors. All of them
//! except `InvalidUrl` are transient and retried by the subscription manager.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ErrorSeverity;

/// Network error type covering connection failures, timeouts and WebSocket errors.
///
/// # Examples
///
/// ```
/// use decibel_core::error::NetworkError;
///
/// let error = NetworkError::ConnectionFailed {
///     reason: "Connection refused".to_string(),
/// };
/// assert!(error.to_string().contains("Connection refused"));
/// assert!(error.is_recoverable());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkError {
    /// Connection to remote host failed.
    #[error("[Network] Connection failed: {reason}")]
    ConnectionFailed {
        /// Reason for the connection failure.
        reason: String,
    },

    /// Connection attempt timed out.
    #[error("[Network] Connection timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// WebSocket protocol or I/O error.
    #[error("[Network] WebSocket error: {reason}")]
    WebSocket {
        /// Reason for the WebSocket error.
        reason: String,
    },

    /// Connection was closed by the peer or dropped.
    #[error("[Network] Connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for the connection closure.
        reason: String,
    },

    /// Endpoint URL or handshake request could not be built.
    #[error("[Network] Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Reconnection attempts were exhausted.
    #[error("[Network] Gave up after {attempts} reconnection attempts")]
    ReconnectExhausted {
        /// Number of attempts made.
        attempts: u32,
    },
}

impl NetworkError {
    /// Returns true if this error is recoverable (can be retried).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.severity().is_recoverable()
    }

    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidUrl { .. } | Self::ReconnectExhausted { .. } => ErrorSeverity::Fatal,
            Self::Timeout { .. }
            | Self::ConnectionFailed { .. }
            | Self::ConnectionClosed { .. }
            | Self::WebSocket { .. } => ErrorSeverity::Recoverable,
        }
    }
}
