//! Prometheus metrics for the streaming client.
//!
//! Metrics are recorded through the `metrics` facade and are no-ops until
//! a recorder is installed, either by [`init_metrics`] or by the host
//! application.

mod config;
mod recorder;

pub use config::MetricsConfig;
pub use recorder::DecibelMetrics;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::runtime::Handle;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and register metric descriptions.
///
/// With `expose_endpoint` set, the scrape endpoint is served by a task on
/// the current Tokio runtime, so the call must be made from inside one.
///
/// # Errors
///
/// Returns an error if the address is invalid, the buckets are rejected,
/// no runtime is available for the endpoint, or a recorder is already
/// installed.
///
/// # Example
///
/// ```no_run
/// use decibel_telemetry::metrics::{MetricsConfig, init_metrics};
///
/// init_metrics(&MetricsConfig::default()).expect("metrics");
/// ```
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if METRICS_HANDLE.get().is_some() {
        return Err(MetricsError::AlreadyInitialized);
    }

    let mut builder = PrometheusBuilder::new();
    if !config.latency_buckets.is_empty() {
        builder = builder
            .set_buckets(&config.latency_buckets)
            .map_err(|e| MetricsError::InitializationFailed(e.to_string()))?;
    }

    let handle = if config.expose_endpoint {
        let addr: SocketAddr = config
            .endpoint_address
            .parse()
            .map_err(|e| MetricsError::InvalidAddress(format!("{e}")))?;

        let runtime = Handle::try_current().map_err(|_| MetricsError::NoRuntime)?;

        let (recorder, exporter) = builder
            .with_http_listener(addr)
            .build()
            .map_err(|e| MetricsError::InitializationFailed(e.to_string()))?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| MetricsError::InitializationFailed(e.to_string()))?;

        runtime.spawn(async move {
            // `ExporterError` implements neither `Debug` nor `Display`.
            if let Err(_e) = exporter.await {
                tracing::error!("Prometheus endpoint stopped");
            }
        });
        tracing::info!(address = %addr, "Prometheus endpoint listening");
        handle
    } else {
        builder
            .install_recorder()
            .map_err(|e| MetricsError::InitializationFailed(e.to_string()))?
    };

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    DecibelMetrics::register();

    Ok(())
}

/// Render the current metrics in Prometheus text format.
///
/// Empty until [`init_metrics`] has succeeded.
#[must_use]
pub fn render_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Errors that can occur during metrics initialization.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Metrics already initialized
    #[error("Metrics system already initialized")]
    AlreadyInitialized,

    /// Invalid endpoint address
    #[error("Invalid endpoint address: {0}")]
    InvalidAddress(String),

    /// The scrape endpoint needs a Tokio runtime
    #[error("Prometheus endpoint requires a running Tokio runtime")]
    NoRuntime,

    /// Initialization failed
    #[error("Metrics initialization failed: {0}")]
    InitializationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address() {
        let config = MetricsConfig {
            expose_endpoint: true,
            endpoint_address: "not an address".to_string(),
            ..MetricsConfig::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(MetricsError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_endpoint_requires_runtime() {
        let config = MetricsConfig {
            expose_endpoint: true,
            endpoint_address: "127.0.0.1:0".to_string(),
            ..MetricsConfig::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(MetricsError::NoRuntime)
        ));
    }

    #[test]
    fn test_render_before_init_is_empty() {
        if METRICS_HANDLE.get().is_none() {
            assert!(render_metrics().is_empty());
        }
    }
}
