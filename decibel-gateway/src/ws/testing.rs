//! In-memory transport for driving the manager in tests.

use async_trait::async_trait;
use decibel_core::error::NetworkError;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use super::config::WebSocketConfig;
use super::message::WebSocketMessage;
use super::transport::{Connection, Transport};

type Frame = Option<Result<WebSocketMessage, NetworkError>>;

/// Fast timers, no heartbeat.
pub(crate) fn test_config() -> WebSocketConfig {
    WebSocketConfig::builder()
        .url("ws://mock")
        .reconnect_delay(Duration::from_millis(5))
        .max_reconnect_delay(Duration::from_millis(20))
        .idle_close_delay(Duration::from_millis(30))
        .close_timeout(Duration::from_secs(1))
        .auto_ping(false)
        .build()
}

/// Server end of one in-memory connection.
pub(crate) struct MockServer {
    sent: mpsc::UnboundedReceiver<WebSocketMessage>,
    frames: mpsc::UnboundedSender<Frame>,
}

impl MockServer {
    /// Next control frame sent by the client, skipping pings.
    pub async fn next_control(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(2), self.sent.recv())
                .await
                .expect("timed out waiting for control frame")
                .expect("connection closed");
            if let WebSocketMessage::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    /// Waits until the client drops its end.
    pub async fn closed(&mut self) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.sent.recv().await.is_some() {}
        })
        .await
        .expect("connection was not closed");
    }

    pub fn push(&self, value: Value) {
        self.push_raw(&value.to_string());
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self
            .frames
            .send(Some(Ok(WebSocketMessage::text(text.to_string()))));
    }

    /// Simulates a network drop.
    pub fn drop_connection(&self) {
        let _ = self.frames.send(None);
    }
}

struct MockConnection {
    sent: mpsc::UnboundedSender<WebSocketMessage>,
    frames: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&mut self, message: WebSocketMessage) -> Result<(), NetworkError> {
        self.sent.send(message).map_err(|_| NetworkError::ConnectionClosed {
            reason: "server gone".to_string(),
        })
    }

    async fn recv(&mut self) -> Option<Result<WebSocketMessage, NetworkError>> {
        self.frames.recv().await.flatten()
    }

    async fn close(&mut self) {}
}

/// Hands every accepted connection's server end to the test.
pub(crate) struct MockTransport {
    pub connects: AtomicU32,
    /// Number of upcoming connects that fail.
    pub failures_left: AtomicU32,
    servers: Mutex<mpsc::UnboundedSender<MockServer>>,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockServer>) {
        let (servers_tx, servers) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            connects: AtomicU32::new(0),
            failures_left: AtomicU32::new(0),
            servers: Mutex::new(servers_tx),
        });
        (transport, servers)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>, NetworkError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NetworkError::ConnectionFailed {
                reason: "refused".to_string(),
            });
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let _ = self.servers.lock().send(MockServer {
            sent: sent_rx,
            frames: frames_tx,
        });
        Ok(Box::new(MockConnection {
            sent: sent_tx,
            frames: frames_rx,
        }))
    }
}
