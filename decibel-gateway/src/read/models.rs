//! Stream payload models.
//!
//! Field names follow the venue's JSON. Prices and sizes are decimal
//! floats on the wire; timestamps are Unix milliseconds.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

/// Price snapshot for one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    /// Market address.
    pub market: String,
    /// Mark price.
    pub mark_px: f64,
    /// Mid price.
    pub mid_px: f64,
    /// Oracle price.
    pub oracle_px: f64,
    /// Funding rate in basis points.
    pub funding_rate_bps: f64,
    /// Whether longs pay shorts.
    pub is_funding_positive: bool,
    /// Open interest.
    pub open_interest: f64,
    /// Transaction time.
    pub transaction_unix_ms: u64,
}

/// `market_price:{market}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPriceMessage {
    /// Latest price.
    pub price: MarketPrice,
}

/// `all_market_prices` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllMarketPricesMessage {
    /// Latest price for every market.
    pub prices: Vec<MarketPrice>,
}

/// One aggregated book level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketOrder {
    /// Level price.
    pub price: f64,
    /// Total size at this level.
    pub size: f64,
}

/// `depth:{market}:{aggregation}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDepth {
    /// Market address.
    pub market: String,
    /// Bids, best first.
    pub bids: Vec<MarketOrder>,
    /// Asks, best first.
    pub asks: Vec<MarketOrder>,
    /// Snapshot time.
    pub unix_ms: u64,
}

impl MarketDepth {
    /// Best bid, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<&MarketOrder> {
        self.bids.first()
    }

    /// Best ask, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<&MarketOrder> {
        self.asks.first()
    }
}

/// One public trade fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTrade {
    /// Account that traded.
    pub account: String,
    /// Market address.
    pub market: String,
    /// Trade action, e.g. `OpenLong`.
    pub action: String,
    pub size: f64,
    pub price: f64,
    pub is_profit: bool,
    pub realized_pnl_amount: f64,
    pub is_funding_positive: bool,
    pub realized_funding_amount: f64,
    pub is_rebate: bool,
    pub fee_amount: f64,
    pub transaction_unix_ms: u64,
    pub transaction_version: u64,
}

/// `trades:{market}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTradesMessage {
    /// New trades.
    pub trades: Vec<MarketTrade>,
}

/// One OHLCV candle. The wire uses single-letter keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candlestick {
    /// Close time.
    #[serde(rename = "T")]
    pub time_end: u64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "h")]
    pub high: f64,
    /// Interval label, e.g. `1m`.
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "o")]
    pub open: f64,
    /// Open time.
    #[serde(rename = "t")]
    pub time_start: u64,
    #[serde(rename = "v")]
    pub volume: f64,
}

/// `market_candlestick:{market}:{interval}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlestickMessage {
    /// Current candle.
    pub candle: Candlestick,
}

/// Open position of a subaccount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPosition {
    pub market: String,
    pub user: String,
    /// Signed size; negative for shorts.
    pub size: f64,
    pub user_leverage: f64,
    pub entry_price: f64,
    pub is_isolated: bool,
    pub unrealized_funding: f64,
    pub estimated_liquidation_price: f64,
    #[serde(default)]
    pub tp_order_id: Option<String>,
    #[serde(default)]
    pub tp_trigger_price: Option<f64>,
    #[serde(default)]
    pub tp_limit_price: Option<f64>,
    #[serde(default)]
    pub sl_order_id: Option<String>,
    #[serde(default)]
    pub sl_trigger_price: Option<f64>,
    #[serde(default)]
    pub sl_limit_price: Option<f64>,
    pub has_fixed_sized_tpsls: bool,
}

/// `account_positions:{subaccount}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPositionsMessage {
    /// Every open position.
    pub positions: Vec<UserPosition>,
}

/// Margin and performance summary of a subaccount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountOverview {
    pub perp_equity_balance: f64,
    pub unrealized_pnl: f64,
    pub unrealized_funding_cost: f64,
    pub cross_margin_ratio: f64,
    pub maintenance_margin: f64,
    #[serde(default)]
    pub cross_account_leverage_ratio: Option<f64>,
    #[serde(default)]
    pub net_deposits: Option<f64>,
    #[serde(default)]
    pub all_time_return: Option<f64>,
    #[serde(default)]
    pub pnl_90d: Option<f64>,
    #[serde(default)]
    pub sharpe_ratio: Option<f64>,
    #[serde(default)]
    pub max_drawdown: Option<f64>,
    #[serde(default)]
    pub weekly_win_rate_12w: Option<f64>,
    #[serde(default)]
    pub average_cash_position: Option<f64>,
    #[serde(default)]
    pub average_leverage: Option<f64>,
    pub cross_account_position: f64,
    pub total_margin: f64,
    pub usdc_cross_withdrawable_balance: f64,
    pub usdc_isolated_withdrawable_balance: f64,
    #[serde(default)]
    pub realized_pnl: Option<f64>,
    #[serde(default)]
    pub liquidation_fees_paid: Option<f64>,
    #[serde(default)]
    pub liquidation_losses: Option<f64>,
}

/// `account_overview:{subaccount}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountOverviewMessage {
    /// Current overview.
    pub account_overview: AccountOverview,
}

/// Resting order of a subaccount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOpenOrder {
    pub parent: String,
    pub market: String,
    pub order_id: String,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub orig_size: Option<f64>,
    #[serde(default)]
    pub remaining_size: Option<f64>,
    #[serde(default)]
    pub size_delta: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    pub is_buy: bool,
    pub details: String,
    pub transaction_version: u64,
    pub unix_ms: u64,
    pub is_tpsl: bool,
    #[serde(default)]
    pub tp_order_id: Option<String>,
    #[serde(default)]
    pub tp_trigger_price: Option<f64>,
    #[serde(default)]
    pub tp_limit_price: Option<f64>,
    #[serde(default)]
    pub sl_order_id: Option<String>,
    #[serde(default)]
    pub sl_trigger_price: Option<f64>,
    #[serde(default)]
    pub sl_limit_price: Option<f64>,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub trigger_condition: Option<String>,
    #[serde(default)]
    pub order_direction: Option<String>,
    #[serde(default)]
    pub is_reduce_only: Option<bool>,
}

/// `account_open_orders:{subaccount}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOpenOrdersMessage {
    /// Every resting order.
    pub orders: Vec<UserOpenOrder>,
}

/// Order as reported by order updates and notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOrder {
    pub parent: String,
    pub market: String,
    pub client_order_id: String,
    pub order_id: String,
    /// Lifecycle status, e.g. `Open` or `Filled`.
    pub status: String,
    pub order_type: String,
    pub trigger_condition: String,
    pub order_direction: String,
    #[serde(default)]
    pub orig_size: Option<f64>,
    #[serde(default)]
    pub remaining_size: Option<f64>,
    #[serde(default)]
    pub size_delta: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    pub is_buy: bool,
    pub is_reduce_only: bool,
    pub details: String,
    pub is_tpsl: bool,
    #[serde(default)]
    pub tp_order_id: Option<String>,
    #[serde(default)]
    pub tp_trigger_price: Option<f64>,
    #[serde(default)]
    pub tp_limit_price: Option<f64>,
    #[serde(default)]
    pub sl_order_id: Option<String>,
    #[serde(default)]
    pub sl_trigger_price: Option<f64>,
    #[serde(default)]
    pub sl_limit_price: Option<f64>,
    pub transaction_version: u64,
    pub unix_ms: u64,
}

/// One order lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOrderUpdate {
    pub status: String,
    pub details: String,
    pub order: UserOrder,
}

/// `order_updates:{subaccount}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOrderUpdateMessage {
    pub order: UserOrderUpdate,
}

/// `user_trades:{subaccount}` payload. Fills share the public trade shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTradesMessage {
    /// New fills.
    pub trades: Vec<MarketTrade>,
}

/// Two-sided bulk quote of a subaccount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBulkOrder {
    pub market: String,
    pub sequence_number: u64,
    pub previous_seq_num: u64,
    pub bid_prices: Vec<f64>,
    pub bid_sizes: Vec<f64>,
    pub ask_prices: Vec<f64>,
    pub ask_sizes: Vec<f64>,
    pub cancelled_bid_prices: Vec<f64>,
    pub cancelled_bid_sizes: Vec<f64>,
    pub cancelled_ask_prices: Vec<f64>,
    pub cancelled_ask_sizes: Vec<f64>,
}

/// One bulk order event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBulkOrderUpdate {
    pub status: String,
    pub details: String,
    pub bulk_order: UserBulkOrder,
}

/// `bulk_orders:{subaccount}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBulkOrderMessage {
    pub bulk_order: UserBulkOrderUpdate,
}

/// TWAP execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwapStatus {
    Activated,
    Finished,
    Cancelled,
}

/// Running TWAP order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActiveTwap {
    pub market: String,
    pub is_buy: bool,
    pub order_id: String,
    pub client_order_id: String,
    pub is_reduce_only: bool,
    pub start_unix_ms: u64,
    /// Seconds between slices.
    pub frequency_s: u64,
    pub duration_s: u64,
    pub orig_size: f64,
    pub remaining_size: f64,
    pub status: TwapStatus,
    pub transaction_unix_ms: u64,
    pub transaction_version: u64,
}

/// `user_active_twaps:{subaccount}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActiveTwapsMessage {
    pub twaps: Vec<UserActiveTwap>,
}

/// Kind of account notification.
///
/// Kinds added by the venue later decode as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    MarketOrderPlaced,
    LimitOrderPlaced,
    StopMarketOrderPlaced,
    StopMarketOrderTriggered,
    StopLimitOrderPlaced,
    StopLimitOrderTriggered,
    OrderPartiallyFilled,
    OrderFilled,
    OrderSizeReduced,
    OrderCancelled,
    OrderRejected,
    OrderErrored,
    TwapOrderPlaced,
    TwapOrderTriggered,
    TwapOrderCompleted,
    TwapOrderCancelled,
    TwapOrderErrored,
    AccountDeposit,
    AccountWithdrawal,
    TpSlSet,
    TpHit,
    SlHit,
    TpCancelled,
    SlCancelled,
    #[serde(other)]
    Other,
}

/// Extra detail attached to some notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationMetadata {
    #[serde(default)]
    pub trigger_price: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub filled_size: Option<f64>,
}

/// One account notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub account: String,
    pub notification_type: NotificationType,
    #[serde(default)]
    pub notification_metadata: Option<NotificationMetadata>,
    /// Order the notification is about, if any.
    #[serde(default)]
    pub order: Option<UserOrder>,
    /// TWAP the notification is about, if any.
    #[serde(default)]
    pub twap: Option<UserActiveTwap>,
}

/// `notifications:{subaccount}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserNotificationMessage {
    pub notification: Notification,
}
