//! WebSocket message types and the subscription wire codec.
//!
//! Outbound control frames are `{"method":"subscribe","topic":"..."}`.
//! Inbound data frames are JSON objects with a string `topic`; every other
//! field is the payload. Objects carrying `success` are control responses.

use decibel_core::error::{NetworkError, ProtocolError};
use decibel_core::types::Topic;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const BIGINT_KEY: &str = "$bigint";

/// WebSocket message types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebSocketMessage {
    /// Text message.
    Text(String),
    /// Binary message.
    Binary(Vec<u8>),
    /// Ping frame.
    Ping(Vec<u8>),
    /// Pong frame.
    Pong(Vec<u8>),
    /// Close frame.
    Close(Option<CloseReason>),
}

/// Close frame reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    /// Close code.
    pub code: u16,
    /// Close reason text.
    pub reason: String,
}

impl WebSocketMessage {
    /// Creates a text message.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Creates a ping message.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::Ping(data.into())
    }

    /// Creates a close message.
    #[must_use]
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Self::Close(Some(CloseReason {
            code,
            reason: reason.into(),
        }))
    }

    /// Returns true if this is a close message.
    #[must_use]
    pub fn is_close(&self) -> bool {
        matches!(self, Self::Close(_))
    }

    /// Returns true for ping and pong frames.
    #[must_use]
    pub fn is_control_frame(&self) -> bool {
        matches!(self, Self::Ping(_) | Self::Pong(_))
    }

    /// Returns the text content if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Subscription control method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMethod {
    /// Start receiving a topic.
    Subscribe,
    /// Stop receiving a topic.
    Unsubscribe,
}

impl ControlMethod {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// Outbound subscription control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Requested operation.
    pub method: ControlMethod,
    /// Target topic.
    pub topic: Topic,
}

impl ControlMessage {
    /// Creates a subscribe message.
    #[must_use]
    pub fn subscribe(topic: Topic) -> Self {
        Self {
            method: ControlMethod::Subscribe,
            topic,
        }
    }

    /// Creates an unsubscribe message.
    #[must_use]
    pub fn unsubscribe(topic: Topic) -> Self {
        Self {
            method: ControlMethod::Unsubscribe,
            topic,
        }
    }
}

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Topic data. `payload` is the frame without its `topic` field.
    Data {
        /// Topic the payload belongs to.
        topic: Topic,
        /// Remaining fields of the frame.
        payload: Value,
    },
    /// Control response (any object with a `success` field).
    Response(Value),
}

/// Codec for the subscription protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec;

impl MessageCodec {
    /// Creates a new message codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Encodes a control message to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if serialization fails.
    pub fn encode_control(&self, message: &ControlMessage) -> Result<WebSocketMessage, NetworkError> {
        serde_json::to_string(message)
            .map(WebSocketMessage::Text)
            .map_err(|e| NetworkError::WebSocket {
                reason: format!("Failed to serialize message: {e}"),
            })
    }

    /// Decodes a data frame.
    ///
    /// Binary frames are accepted when they hold UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` for malformed JSON, frames without a topic and
    /// non-data frames.
    pub fn decode(&self, message: &WebSocketMessage) -> Result<InboundMessage, ProtocolError> {
        match message {
            WebSocketMessage::Text(text) => self.decode_str(text),
            WebSocketMessage::Binary(data) => match std::str::from_utf8(data) {
                Ok(text) => self.decode_str(text),
                Err(_) => Err(ProtocolError::UnsupportedFrame {
                    kind: "binary (non UTF-8)".to_string(),
                }),
            },
            WebSocketMessage::Ping(_) => Err(unsupported("ping")),
            WebSocketMessage::Pong(_) => Err(unsupported("pong")),
            WebSocketMessage::Close(_) => Err(unsupported("close")),
        }
    }

    /// Decodes a JSON text payload.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` for malformed JSON and frames without a topic.
    pub fn decode_str(&self, json: &str) -> Result<InboundMessage, ProtocolError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| ProtocolError::invalid_json(e.to_string(), json))?;

        let Value::Object(mut object) = value else {
            return Err(ProtocolError::missing_topic(json));
        };

        if object.contains_key("success") {
            return Ok(InboundMessage::Response(Value::Object(object)));
        }

        match object.remove("topic") {
            Some(Value::String(topic)) => {
                let mut payload = Value::Object(object);
                revive_bigints(&mut payload);
                Ok(InboundMessage::Data {
                    topic: Topic::new_unchecked(topic),
                    payload,
                })
            }
            _ => Err(ProtocolError::missing_topic(json)),
        }
    }
}

fn unsupported(kind: &str) -> ProtocolError {
    ProtocolError::UnsupportedFrame {
        kind: kind.to_string(),
    }
}

/// Replaces every `{"$bigint": "<digits>"}` object with a JSON number.
///
/// Integers outside the i64/u64 range become the nearest f64. Anything that
/// is not an integer literal stays as its string.
pub fn revive_bigints(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(revive_bigints),
        Value::Object(object) => {
            if let Some(revived) = bigint_value(object) {
                *value = revived;
                return;
            }
            object.values_mut().for_each(revive_bigints);
        }
        _ => {}
    }
}

fn bigint_value(object: &Map<String, Value>) -> Option<Value> {
    let Some(Value::String(digits)) = object.get(BIGINT_KEY) else {
        return None;
    };
    let revived = if let Ok(n) = digits.parse::<u64>() {
        Value::from(n)
    } else if let Ok(n) = digits.parse::<i64>() {
        Value::from(n)
    } else if is_integer_literal(digits)
        && let Ok(n) = digits.parse::<f64>()
    {
        Value::from(n)
    } else {
        Value::String(digits.clone())
    };
    Some(revived)
}

fn is_integer_literal(digits: &str) -> bool {
    let unsigned = digits.strip_prefix('-').unwrap_or(digits);
    !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit())
}
