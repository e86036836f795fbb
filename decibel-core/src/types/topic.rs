//! Stream topics.
//!
//! A topic is the opaque string the server uses to route messages, e.g.
//! `depth:0xabc...:10`. Known streams follow `{kind}:{key}[:{param}]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{AccountAddress, ValidationError};

/// Identifier of a server-side stream, used as the subscription key.
///
/// Any non-empty string without whitespace is accepted, so topics the SDK
/// has no constructor for can still be subscribed.
///
/// # Examples
///
/// ```
/// use decibel_core::types::{StreamKind, Topic};
///
/// let topic = Topic::new("all_market_prices").unwrap();
/// assert_eq!(topic.kind(), Some(StreamKind::AllMarketPrices));
/// assert!(Topic::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Creates a new `Topic` from a string.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyTopic` if the string is empty.
    /// Returns `ValidationError::InvalidTopic` if it contains whitespace or
    /// control characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::InvalidTopic(s));
        }
        Ok(Self(s))
    }

    /// Creates a new `Topic` without validation.
    #[must_use]
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the topic as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the stream kind if the prefix is a known one.
    #[must_use]
    pub fn kind(&self) -> Option<StreamKind> {
        let prefix = self.0.split(':').next()?;
        prefix.parse().ok()
    }

    /// Price updates for one market.
    #[must_use]
    pub fn market_price(market: &AccountAddress) -> Self {
        Self::keyed(StreamKind::MarketPrice, &market.to_string())
    }

    /// Price updates for every market.
    #[must_use]
    pub fn all_market_prices() -> Self {
        Self(StreamKind::AllMarketPrices.as_str().to_string())
    }

    /// Order book depth for one market at the given aggregation.
    #[must_use]
    pub fn depth(market: &AccountAddress, aggregation: DepthAggregation) -> Self {
        Self(format!(
            "{}:{market}:{}",
            StreamKind::Depth.as_str(),
            aggregation.as_u32()
        ))
    }

    /// Public trades for one market.
    #[must_use]
    pub fn trades(market: &AccountAddress) -> Self {
        Self::keyed(StreamKind::Trades, &market.to_string())
    }

    /// Candles for one market at the given interval.
    #[must_use]
    pub fn candlestick(market: &AccountAddress, interval: CandlestickInterval) -> Self {
        Self(format!(
            "{}:{market}:{}",
            StreamKind::MarketCandlestick.as_str(),
            interval.as_str()
        ))
    }

    /// Per-account stream for a subaccount.
    ///
    /// `kind` should be one of the account kinds; market kinds produce a
    /// topic the server will not recognize.
    #[must_use]
    pub fn account(kind: StreamKind, subaccount: &AccountAddress) -> Self {
        Self::keyed(kind, &subaccount.to_string())
    }

    fn keyed(kind: StreamKind, key: &str) -> Self {
        Self(format!("{}:{key}", kind.as_str()))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Topic {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

/// Known stream families, by topic prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// `market_price:{market}`
    MarketPrice,
    /// `all_market_prices`
    AllMarketPrices,
    /// `depth:{market}:{aggregation}`
    Depth,
    /// `trades:{market}`
    Trades,
    /// `market_candlestick:{market}:{interval}`
    MarketCandlestick,
    /// `account_overview:{subaccount}`
    AccountOverview,
    /// `account_positions:{subaccount}`
    AccountPositions,
    /// `account_open_orders:{subaccount}`
    AccountOpenOrders,
    /// `order_updates:{subaccount}`
    OrderUpdates,
    /// `user_trades:{subaccount}`
    UserTrades,
    /// `bulk_orders:{subaccount}`
    BulkOrders,
    /// `user_active_twaps:{subaccount}`
    UserActiveTwaps,
    /// `notifications:{subaccount}`
    Notifications,
}

impl StreamKind {
    /// All known kinds.
    pub const ALL: [Self; 13] = [
        Self::MarketPrice,
        Self::AllMarketPrices,
        Self::Depth,
        Self::Trades,
        Self::MarketCandlestick,
        Self::AccountOverview,
        Self::AccountPositions,
        Self::AccountOpenOrders,
        Self::OrderUpdates,
        Self::UserTrades,
        Self::BulkOrders,
        Self::UserActiveTwaps,
        Self::Notifications,
    ];

    /// Returns the topic prefix.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MarketPrice => "market_price",
            Self::AllMarketPrices => "all_market_prices",
            Self::Depth => "depth",
            Self::Trades => "trades",
            Self::MarketCandlestick => "market_candlestick",
            Self::AccountOverview => "account_overview",
            Self::AccountPositions => "account_positions",
            Self::AccountOpenOrders => "account_open_orders",
            Self::OrderUpdates => "order_updates",
            Self::UserTrades => "user_trades",
            Self::BulkOrders => "bulk_orders",
            Self::UserActiveTwaps => "user_active_twaps",
            Self::Notifications => "notifications",
        }
    }

    /// Returns true for streams keyed by subaccount.
    #[must_use]
    pub const fn is_account_stream(&self) -> bool {
        !matches!(
            self,
            Self::MarketPrice
                | Self::AllMarketPrices
                | Self::Depth
                | Self::Trades
                | Self::MarketCandlestick
        )
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownStreamKind(s.to_string()))
    }
}

/// Price bucket size for order book depth streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum DepthAggregation {
    /// No aggregation.
    #[default]
    One,
    /// 2 ticks.
    Two,
    /// 5 ticks.
    Five,
    /// 10 ticks.
    Ten,
    /// 100 ticks.
    Hundred,
    /// 1000 ticks.
    Thousand,
}

impl DepthAggregation {
    /// Supported sizes, ascending.
    pub const ALL: [Self; 6] = [
        Self::One,
        Self::Two,
        Self::Five,
        Self::Ten,
        Self::Hundred,
        Self::Thousand,
    ];

    /// Returns the numeric size.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Five => 5,
            Self::Ten => 10,
            Self::Hundred => 100,
            Self::Thousand => 1000,
        }
    }
}

impl TryFrom<u32> for DepthAggregation {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|agg| agg.as_u32() == value)
            .ok_or(ValidationError::InvalidAggregation(value))
    }
}

impl fmt::Display for DepthAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Candle width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CandlestickInterval {
    /// 1 minute.
    OneMinute,
    /// 5 minutes.
    FiveMinutes,
    /// 15 minutes.
    FifteenMinutes,
    /// 30 minutes.
    ThirtyMinutes,
    /// 1 hour.
    OneHour,
    /// 2 hours.
    TwoHours,
    /// 4 hours.
    FourHours,
    /// 8 hours.
    EightHours,
    /// 12 hours.
    TwelveHours,
    /// 1 day.
    OneDay,
    /// 3 days.
    ThreeDays,
    /// 1 week.
    OneWeek,
    /// 1 month.
    OneMonth,
}

impl CandlestickInterval {
    /// All supported intervals, shortest first.
    pub const ALL: [Self; 13] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::TwoHours,
        Self::FourHours,
        Self::EightHours,
        Self::TwelveHours,
        Self::OneDay,
        Self::ThreeDays,
        Self::OneWeek,
        Self::OneMonth,
    ];

    /// Returns the wire form, e.g. `"15m"`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
            Self::FourHours => "4h",
            Self::EightHours => "8h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1d",
            Self::ThreeDays => "3d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1mo",
        }
    }
}

impl fmt::Display for CandlestickInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandlestickInterval {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidInterval(s.to_string()))
    }
}

impl TryFrom<String> for CandlestickInterval {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CandlestickInterval> for String {
    fn from(interval: CandlestickInterval) -> Self {
        interval.as_str().to_string()
    }
}
