//! Protocol error types for inbound stream messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of payload characters kept in an error.
const PAYLOAD_PREVIEW_CHARS: usize = 256;

/// An inbound message that cannot be mapped to a topic.
///
/// These are dropped and logged; they never tear down the connection.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolError {
    /// The frame is not valid JSON.
    #[error("[Protocol] Failed to parse JSON ({reason}): {payload}")]
    InvalidJson {
        /// Parser error message.
        reason: String,
        /// Truncated raw payload.
        payload: String,
    },

    /// The JSON document has no string `topic` field.
    #[error("[Protocol] Missing topic field: {payload}")]
    MissingTopic {
        /// Truncated raw payload.
        payload: String,
    },

    /// The frame type carries no stream data.
    #[error("[Protocol] Unsupported frame: {kind}")]
    UnsupportedFrame {
        /// Frame kind, e.g. "binary (invalid utf-8)".
        kind: String,
    },
}

impl ProtocolError {
    /// Creates an `InvalidJson` error, truncating the payload.
    #[must_use]
    pub fn invalid_json(reason: impl Into<String>, payload: &str) -> Self {
        Self::InvalidJson {
            reason: reason.into(),
            payload: preview(payload),
        }
    }

    /// Creates a `MissingTopic` error, truncating the payload.
    #[must_use]
    pub fn missing_topic(payload: &str) -> Self {
        Self::MissingTopic {
            payload: preview(payload),
        }
    }
}

fn preview(payload: &str) -> String {
    if payload.chars().count() <= PAYLOAD_PREVIEW_CHARS {
        payload.to_string()
    } else {
        let head: String = payload.chars().take(PAYLOAD_PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}
