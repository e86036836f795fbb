//! Core type definitions.
//!
//! - [`AccountAddress`] - 32-byte on-chain address with named object derivation
//! - [`Topic`] - stream identifier used as the subscription key
//! - [`StreamKind`], [`DepthAggregation`], [`CandlestickInterval`] - topic components

mod address;
mod topic;

pub use address::{AccountAddress, bcs_encode_str};
pub use topic::{CandlestickInterval, DepthAggregation, StreamKind, Topic};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// Topic string is empty.
    #[error("topic cannot be empty")]
    EmptyTopic,

    /// Topic string contains whitespace or control characters.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// Unknown stream kind prefix.
    #[error("unknown stream kind: {0}")]
    UnknownStreamKind(String),

    /// Unsupported depth aggregation size.
    #[error("unsupported depth aggregation size: {0}")]
    InvalidAggregation(u32),

    /// Unknown candlestick interval.
    #[error("unknown candlestick interval: {0}")]
    InvalidInterval(String),
}
