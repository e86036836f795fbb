//! Market data streams keyed by market name or address.

use decibel_core::config::DecibelConfig;
use decibel_core::error::SubscriptionError;
use decibel_core::types::{AccountAddress, CandlestickInterval, DepthAggregation, Topic};
use std::sync::Arc;

use super::models::{
    AllMarketPricesMessage, CandlestickMessage, MarketDepth, MarketPriceMessage,
    MarketTradesMessage,
};
use crate::ws::{CallbackHandle, SubscriptionManager};

/// Mark, mid and oracle prices.
#[derive(Debug, Clone)]
pub struct MarketPriceStream {
    manager: Arc<SubscriptionManager>,
    config: Arc<DecibelConfig>,
}

impl MarketPriceStream {
    pub(crate) fn new(manager: Arc<SubscriptionManager>, config: Arc<DecibelConfig>) -> Self {
        Self { manager, config }
    }

    /// Subscribes to prices of a market by name, e.g. `BTC/USD`.
    pub fn subscribe_by_name<F>(
        &self,
        market_name: &str,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(MarketPriceMessage) + Send + Sync + 'static,
    {
        self.subscribe_by_address(&self.config.market_address(market_name), on_data)
    }

    /// Subscribes to prices of a market by address.
    pub fn subscribe_by_address<F>(
        &self,
        market: &AccountAddress,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(MarketPriceMessage) + Send + Sync + 'static,
    {
        self.manager
            .subscribe_typed(Topic::market_price(market), on_data)
    }

    /// Subscribes to prices of every market.
    pub fn subscribe_all<F>(&self, on_data: F) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(AllMarketPricesMessage) + Send + Sync + 'static,
    {
        self.manager
            .subscribe_typed(Topic::all_market_prices(), on_data)
    }
}

/// Aggregated order book.
#[derive(Debug, Clone)]
pub struct MarketDepthStream {
    manager: Arc<SubscriptionManager>,
    config: Arc<DecibelConfig>,
}

impl MarketDepthStream {
    pub(crate) fn new(manager: Arc<SubscriptionManager>, config: Arc<DecibelConfig>) -> Self {
        Self { manager, config }
    }

    fn topic(&self, market_name: &str, aggregation: DepthAggregation) -> Topic {
        Topic::depth(&self.config.market_address(market_name), aggregation)
    }

    /// Subscribes to the book of a market at the given price aggregation.
    pub fn subscribe_by_name<F>(
        &self,
        market_name: &str,
        aggregation: DepthAggregation,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(MarketDepth) + Send + Sync + 'static,
    {
        self.manager
            .subscribe_typed(self.topic(market_name, aggregation), on_data)
    }

    /// Asks the server for a fresh book snapshot.
    pub fn reset_subscription_by_name(&self, market_name: &str, aggregation: DepthAggregation) {
        self.manager.reset(&self.topic(market_name, aggregation));
    }

    /// Supported aggregation sizes.
    #[must_use]
    pub fn aggregation_sizes(&self) -> &'static [DepthAggregation] {
        &DepthAggregation::ALL
    }
}

/// Public trades.
#[derive(Debug, Clone)]
pub struct MarketTradeStream {
    manager: Arc<SubscriptionManager>,
    config: Arc<DecibelConfig>,
}

impl MarketTradeStream {
    pub(crate) fn new(manager: Arc<SubscriptionManager>, config: Arc<DecibelConfig>) -> Self {
        Self { manager, config }
    }

    /// Subscribes to trades of a market by name.
    pub fn subscribe_by_name<F>(
        &self,
        market_name: &str,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(MarketTradesMessage) + Send + Sync + 'static,
    {
        let market = self.config.market_address(market_name);
        self.manager.subscribe_typed(Topic::trades(&market), on_data)
    }
}

/// OHLCV candles.
#[derive(Debug, Clone)]
pub struct CandlestickStream {
    manager: Arc<SubscriptionManager>,
    config: Arc<DecibelConfig>,
}

impl CandlestickStream {
    pub(crate) fn new(manager: Arc<SubscriptionManager>, config: Arc<DecibelConfig>) -> Self {
        Self { manager, config }
    }

    /// Subscribes to candles of a market by name.
    pub fn subscribe_by_name<F>(
        &self,
        market_name: &str,
        interval: CandlestickInterval,
        on_data: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(CandlestickMessage) + Send + Sync + 'static,
    {
        let market = self.config.market_address(market_name);
        self.manager
            .subscribe_typed(Topic::candlestick(&market, interval), on_data)
    }
}
