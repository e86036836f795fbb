//! Socket abstraction used by the subscription manager.
//!
//! [`TungsteniteTransport`] is the production implementation. Tests drive the
//! manager through in-memory implementations of the same traits.

use async_trait::async_trait;
use decibel_core::error::NetworkError;
use decibel_telemetry::masking::SensitiveDataMasker;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use super::config::WebSocketConfig;
use super::message::{CloseReason, WebSocketMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens connections to the stream endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a new connection.
    async fn connect(&self) -> Result<Box<dyn Connection>, NetworkError>;
}

/// One open WebSocket connection.
#[async_trait]
pub trait Connection: Send {
    /// Sends a frame.
    async fn send(&mut self, message: WebSocketMessage) -> Result<(), NetworkError>;

    /// Receives the next frame. `None` means the connection ended.
    ///
    /// Must be cancel-safe: it is polled inside `tokio::select!`.
    async fn recv(&mut self) -> Option<Result<WebSocketMessage, NetworkError>>;

    /// Closes the connection, ignoring errors.
    async fn close(&mut self);
}

/// Transport backed by `tokio-tungstenite`.
///
/// When an API key is configured the handshake carries
/// `Sec-WebSocket-Protocol: decibel, <api key>`.
pub struct TungsteniteTransport {
    url: String,
    api_key: Option<String>,
}

impl TungsteniteTransport {
    /// Creates a transport for the given endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
        }
    }

    /// Creates a transport from a manager configuration.
    #[must_use]
    pub fn from_config(config: &WebSocketConfig) -> Self {
        Self::new(config.url.clone(), config.api_key.clone())
    }

    fn invalid_url(&self, reason: impl ToString) -> NetworkError {
        NetworkError::InvalidUrl {
            url: SensitiveDataMasker::new().mask_string(&self.url).into_owned(),
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Debug for TungsteniteTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TungsteniteTransport")
            .field("url", &SensitiveDataMasker::new().mask_string(&self.url))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>, NetworkError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| self.invalid_url(e))?;

        if let Some(key) = &self.api_key {
            let protocols =
                HeaderValue::from_str(&format!("decibel, {key}")).map_err(|e| self.invalid_url(e))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocols);
        }

        let (stream, response) =
            connect_async(request)
                .await
                .map_err(|e| NetworkError::ConnectionFailed {
                    reason: e.to_string(),
                })?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(TungsteniteConnection { stream }))
    }
}

struct TungsteniteConnection {
    stream: WsStream,
}

#[async_trait]
impl Connection for TungsteniteConnection {
    async fn send(&mut self, message: WebSocketMessage) -> Result<(), NetworkError> {
        self.stream
            .send(to_tungstenite_message(message))
            .await
            .map_err(|e| NetworkError::WebSocket {
                reason: e.to_string(),
            })
    }

    async fn recv(&mut self) -> Option<Result<WebSocketMessage, NetworkError>> {
        loop {
            match self.stream.next().await? {
                Ok(msg) => {
                    if let Some(ws_msg) = from_tungstenite_message(msg) {
                        return Some(Ok(ws_msg));
                    }
                }
                Err(e) => {
                    return Some(Err(NetworkError::WebSocket {
                        reason: e.to_string(),
                    }));
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

fn to_tungstenite_message(msg: WebSocketMessage) -> TungsteniteMessage {
    match msg {
        WebSocketMessage::Text(s) => TungsteniteMessage::Text(s),
        WebSocketMessage::Binary(b) => TungsteniteMessage::Binary(b),
        WebSocketMessage::Ping(b) => TungsteniteMessage::Ping(b),
        WebSocketMessage::Pong(b) => TungsteniteMessage::Pong(b),
        WebSocketMessage::Close(reason) => TungsteniteMessage::Close(reason.map(|r| CloseFrame {
            code: CloseCode::from(r.code),
            reason: r.reason.into(),
        })),
    }
}

// Raw frames only surface when reading with the low-level API.
fn from_tungstenite_message(msg: TungsteniteMessage) -> Option<WebSocketMessage> {
    match msg {
        TungsteniteMessage::Text(s) => Some(WebSocketMessage::Text(s)),
        TungsteniteMessage::Binary(b) => Some(WebSocketMessage::Binary(b)),
        TungsteniteMessage::Ping(b) => Some(WebSocketMessage::Ping(b)),
        TungsteniteMessage::Pong(b) => Some(WebSocketMessage::Pong(b)),
        TungsteniteMessage::Close(frame) => Some(WebSocketMessage::Close(frame.map(|f| {
            CloseReason {
                code: f.code.into(),
                reason: f.reason.to_string(),
            }
        }))),
        TungsteniteMessage::Frame(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_conversion() {
        let tung = to_tungstenite_message(WebSocketMessage::text("hello"));
        assert!(matches!(tung, TungsteniteMessage::Text(s) if s == "hello"));

        let tung = to_tungstenite_message(WebSocketMessage::ping(vec![1, 2]));
        assert!(matches!(tung, TungsteniteMessage::Ping(b) if b == vec![1, 2]));

        let tung = to_tungstenite_message(WebSocketMessage::close(1000, "bye"));
        let TungsteniteMessage::Close(Some(frame)) = tung else {
            panic!("expected close frame");
        };
        assert_eq!(frame.code, CloseCode::Normal);
        assert_eq!(frame.reason, "bye");
    }

    #[test]
    fn test_from_tungstenite_message() {
        let ws_msg = from_tungstenite_message(TungsteniteMessage::Text("hi".to_string()));
        assert_eq!(ws_msg, Some(WebSocketMessage::text("hi")));

        let ws_msg = from_tungstenite_message(TungsteniteMessage::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "restart".into(),
        })));
        assert_eq!(ws_msg, Some(WebSocketMessage::close(1001, "restart")));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let transport = TungsteniteTransport::new("not a url", None);
        let err = transport.connect().await.err().unwrap();
        assert!(matches!(err, NetworkError::InvalidUrl { .. }));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let transport = TungsteniteTransport::new("wss://example.com/ws", Some("secret-key-value".into()));
        assert!(!format!("{transport:?}").contains("secret-key-value"));
    }
}
