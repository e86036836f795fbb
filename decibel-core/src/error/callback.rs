//! Errors raised by caller-supplied stream callbacks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A callback failed while handling a message.
///
/// The failure is contained to the callback that raised it: remaining
/// callbacks for the same message still run and the connection stays up.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackError {
    /// The callback returned an error.
    #[error("[Callback] Listener for '{topic}' failed: {reason}")]
    Failed {
        /// Topic being dispatched.
        topic: String,
        /// Error reported by the callback.
        reason: String,
    },

    /// The callback panicked.
    #[error("[Callback] Listener for '{topic}' panicked: {message}")]
    Panicked {
        /// Topic being dispatched.
        topic: String,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// The payload did not match the callback's message type.
    #[error("[Callback] Failed to decode '{topic}' payload: {reason}")]
    Decode {
        /// Topic being dispatched.
        topic: String,
        /// Deserializer error message.
        reason: String,
    },
}

impl CallbackError {
    /// Returns the topic the failing callback was registered for.
    #[must_use]
    pub fn topic(&self) -> &str {
        match self {
            Self::Failed { topic, .. } | Self::Panicked { topic, .. } | Self::Decode { topic, .. } => {
                topic
            }
        }
    }
}
