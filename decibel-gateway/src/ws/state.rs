//! Connection state management.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Connection state of the subscription manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    Disconnected,
    /// Opening a connection, or waiting out a reconnect delay.
    Connecting,
    /// Connected and every live topic has been re-subscribed.
    Connected,
    /// `close()` is in progress.
    Closing,
    /// Closed for good.
    Closed,
}

impl ConnectionState {
    /// Returns true if the connection is active.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if the manager has been closed or is closing.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Internal state tracking for the manager.
///
/// Once `Closing` or `Closed` is reached, only `mark_closed` changes state.
#[derive(Debug)]
pub(crate) struct InternalState {
    pub state: ConnectionState,
    /// Consecutive reconnection attempts since the last successful connect.
    pub reconnect_attempts: u32,
    pub last_connected: Option<Instant>,
}

impl Default for InternalState {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            last_connected: None,
        }
    }
}

impl InternalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a first connection attempt.
    pub fn mark_connecting(&mut self) {
        if !self.state.is_terminal() {
            self.state = ConnectionState::Connecting;
        }
    }

    /// Marks a reconnection attempt and bumps the counter.
    pub fn mark_reconnecting(&mut self) {
        if !self.state.is_terminal() {
            self.state = ConnectionState::Connecting;
            self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        }
    }

    pub fn mark_connected(&mut self) {
        if !self.state.is_terminal() {
            self.state = ConnectionState::Connected;
            self.reconnect_attempts = 0;
            self.last_connected = Some(Instant::now());
        }
    }

    pub fn mark_disconnected(&mut self) {
        if !self.state.is_terminal() {
            self.state = ConnectionState::Disconnected;
        }
    }

    pub fn mark_closing(&mut self) {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closing;
        }
    }

    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
    }
}
