//! WebSocket subscription infrastructure.
//!
//! - [`SubscriptionManager`] owns one connection and routes inbound messages
//!   to callbacks registered per [`Topic`](decibel_core::types::Topic)
//! - Drops are retried with exponential backoff; every live topic is
//!   re-subscribed before the manager reports `Connected`
//! - [`Transport`] and [`Connection`] abstract the socket so the manager can
//!   run against an in-memory transport in tests
//!
//! # Example
//!
//! ```ignore
//! use decibel_core::types::Topic;
//! use decibel_gateway::ws::{SubscriptionManager, WebSocketConfig};
//!
//! let config = WebSocketConfig::builder()
//!     .url("wss://api.testnet.aptoslabs.com/decibel/ws")
//!     .build();
//! let manager = SubscriptionManager::new(config);
//!
//! let handle = manager.subscribe(Topic::all_market_prices(), |payload| {
//!     println!("{payload}");
//! })?;
//! handle.unsubscribe();
//! manager.close().await;
//! ```

mod config;
mod manager;
mod message;
mod registry;
mod state;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{WebSocketConfig, WebSocketConfigBuilder};
pub use manager::{CallbackHandle, ErrorHook, SubscriptionManager, SubscriptionManagerBuilder};
pub use message::{
    CloseReason, ControlMessage, ControlMethod, InboundMessage, MessageCodec, WebSocketMessage,
    revive_bigints,
};
pub use state::ConnectionState;
pub use transport::{Connection, Transport, TungsteniteTransport};
