//! Account address parsing errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An account address string could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressError {
    /// The string contains non-hex characters.
    #[error("[Address] Invalid hex in '{value}'")]
    InvalidHex {
        /// The rejected input.
        value: String,
    },

    /// The string is empty or longer than 32 bytes.
    #[error("[Address] Invalid length {length} for '{value}' (expected 1..=64 hex digits)")]
    InvalidLength {
        /// The rejected input.
        value: String,
        /// Number of hex digits found.
        length: usize,
    },
}
