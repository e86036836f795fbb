//! Metrics configuration types.

use serde::{Deserialize, Serialize};

/// Configuration for the metrics system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether to expose a Prometheus HTTP endpoint
    #[serde(default)]
    pub expose_endpoint: bool,

    /// Address for the Prometheus endpoint (e.g., "0.0.0.0:9090")
    #[serde(default = "default_endpoint_address")]
    pub endpoint_address: String,

    /// Histogram buckets for callback latency (in seconds)
    #[serde(default = "default_latency_buckets")]
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            expose_endpoint: false,
            endpoint_address: default_endpoint_address(),
            latency_buckets: default_latency_buckets(),
        }
    }
}

fn default_endpoint_address() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_latency_buckets() -> Vec<f64> {
    vec![
        0.000_01, // 10µs
        0.000_1,  // 100µs
        0.001,    // 1ms
        0.005,    // 5ms
        0.01,     // 10ms
        0.05,     // 50ms
        0.1,      // 100ms
        1.0,      // 1s
    ]
}
