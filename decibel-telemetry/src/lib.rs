//! # Decibel Telemetry
//!
//! Logging, tracing and metrics for the Decibel SDK.
//!
//! - Structured logging with JSON and pretty formats, optional rolling files
//! - Masking of API keys and tokens before they reach logs
//! - Spans for connections, dispatch and subscription changes
//! - Prometheus metrics for the streaming connection

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

/// Logging configuration and initialization
pub mod logging;

/// Sensitive data masking
pub mod masking;

/// Span definitions
pub mod spans;

/// Metrics collection and export
pub mod metrics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::logging::{LogConfig, LogFormat, LogOutput, init_logging};
    pub use crate::masking::{Sensitive, SensitiveDataMasker};
    pub use crate::metrics::{DecibelMetrics, MetricsConfig, init_metrics};
    pub use crate::spans::*;
}
