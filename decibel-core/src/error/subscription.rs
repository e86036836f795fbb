//! Errors returned by subscription manager operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ErrorSeverity;

/// Subscription operation rejected by the manager.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionError {
    /// The manager was closed; no further subscriptions are accepted.
    #[error("[Subscription] Manager is closed")]
    Closed,

    /// The manager needs a Tokio runtime to drive its connection.
    #[error("[Subscription] No Tokio runtime available to drive the connection")]
    NoRuntime,
}

impl SubscriptionError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Fatal
    }
}
