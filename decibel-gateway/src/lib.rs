//! # Decibel Gateway
//!
//! Streaming access to the Decibel trading venue.
//!
//! This crate provides:
//! - A subscription manager that multiplexes topics over one WebSocket,
//!   reconnects with backoff and replays subscriptions
//! - Typed read streams for prices, depth, trades, candles and accounts
//!
//! # Example
//!
//! ```ignore
//! use decibel_core::config::DecibelConfig;
//! use decibel_gateway::read::ReadClient;
//!
//! let client = ReadClient::new(DecibelConfig::named("testnet")?, None);
//! let handle = client.market_prices().subscribe_by_name("BTC/USD", |msg| {
//!     println!("mark {}", msg.price.mark_px);
//! })?;
//! // ...
//! handle.unsubscribe();
//! client.close().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

/// WebSocket transport and subscription manager
pub mod ws;

/// Typed read streams
pub mod read;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::read::ReadClient;
    pub use crate::ws::{
        CallbackHandle, ConnectionState, SubscriptionManager, WebSocketConfig,
        WebSocketConfigBuilder,
    };
}
