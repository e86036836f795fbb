//! Typed read streams over a shared subscription manager.
//!
//! [`ReadClient`] resolves market names to on-chain addresses, builds the
//! topic strings and decodes payloads into the models in [`models`].

mod account;
mod market;
pub mod models;

pub use account::AccountStream;
pub use market::{CandlestickStream, MarketDepthStream, MarketPriceStream, MarketTradeStream};

use decibel_core::config::DecibelConfig;
use std::sync::Arc;

use crate::ws::{ConnectionState, SubscriptionManager, WebSocketConfig};

/// Entry point for streaming venue data.
///
/// Every stream shares one connection.
#[derive(Debug, Clone)]
pub struct ReadClient {
    config: Arc<DecibelConfig>,
    manager: Arc<SubscriptionManager>,
}

impl ReadClient {
    /// Creates a client for a deployment. `api_key` is sent in the
    /// WebSocket handshake when set.
    #[must_use]
    pub fn new(config: DecibelConfig, api_key: Option<String>) -> Self {
        let ws = WebSocketConfig::from_decibel_config(&config, api_key);
        Self::with_manager(config, Arc::new(SubscriptionManager::new(ws)))
    }

    /// Creates a client over an existing manager.
    #[must_use]
    pub fn with_manager(config: DecibelConfig, manager: Arc<SubscriptionManager>) -> Self {
        Self {
            config: Arc::new(config),
            manager,
        }
    }

    /// Deployment configuration.
    #[must_use]
    pub fn config(&self) -> &DecibelConfig {
        &self.config
    }

    /// The shared subscription manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<SubscriptionManager> {
        &self.manager
    }

    /// Market price stream.
    #[must_use]
    pub fn market_prices(&self) -> MarketPriceStream {
        MarketPriceStream::new(Arc::clone(&self.manager), Arc::clone(&self.config))
    }

    /// Order book stream.
    #[must_use]
    pub fn market_depth(&self) -> MarketDepthStream {
        MarketDepthStream::new(Arc::clone(&self.manager), Arc::clone(&self.config))
    }

    /// Public trade stream.
    #[must_use]
    pub fn market_trades(&self) -> MarketTradeStream {
        MarketTradeStream::new(Arc::clone(&self.manager), Arc::clone(&self.config))
    }

    /// Candlestick stream.
    #[must_use]
    pub fn candlesticks(&self) -> CandlestickStream {
        CandlestickStream::new(Arc::clone(&self.manager), Arc::clone(&self.config))
    }

    /// Subaccount streams.
    #[must_use]
    pub fn account(&self) -> AccountStream {
        AccountStream::new(Arc::clone(&self.manager))
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Closes the shared connection and drops every subscription.
    pub async fn close(&self) {
        self.manager.close().await;
    }
}
