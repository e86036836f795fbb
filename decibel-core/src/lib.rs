//! # Decibel Core
//!
//! Core types, errors and configuration shared by the Decibel SDK crates.
//!
//! This crate provides:
//! - Error taxonomy for connection, protocol, callback and configuration failures
//! - Account addresses and named object address derivation
//! - Stream topics used as subscription keys
//! - Venue configuration with named deployments and YAML/TOML/JSON loading

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]

/// Core type definitions (addresses, topics)
pub mod types;

/// Error types and handling
pub mod error;

/// Configuration management
pub mod config;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{DecibelError, ErrorSeverity};
    pub use crate::types::*;
}
