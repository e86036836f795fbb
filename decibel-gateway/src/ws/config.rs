//! Subscription manager configuration.

use decibel_core::config::{Configurable, DecibelConfig, Validatable, ValidationContext, Validator};
use decibel_core::config::validation::EnvOverride;
use decibel_core::error::ConfigError;
use decibel_telemetry::masking::SensitiveDataMasker;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the WebSocket subscription manager.
///
/// Contains the endpoint, credentials, reconnection parameters and timers.
#[derive(Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// WebSocket endpoint URL.
    pub url: String,

    /// API key sent as the second `Sec-WebSocket-Protocol` entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Whether automatic reconnection is enabled.
    #[serde(default = "default_reconnect_enabled")]
    pub reconnect_enabled: bool,

    /// Maximum number of consecutive reconnection attempts (0 = unlimited).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Initial reconnection delay in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Maximum reconnection delay in milliseconds.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Backoff multiplier for exponential backoff.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Ping interval in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Whether to send ping frames automatically.
    #[serde(default = "default_auto_ping")]
    pub auto_ping: bool,

    /// Delay before closing a connection with no remaining subscriptions.
    #[serde(default = "default_idle_close_delay_ms")]
    pub idle_close_delay_ms: u64,

    /// How long `close()` waits for the connection task to finish.
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect_enabled() -> bool {
    true
}

fn default_max_reconnect_attempts() -> u32 {
    0 // unlimited
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_max_reconnect_delay_ms() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_auto_ping() -> bool {
    true
}

fn default_idle_close_delay_ms() -> u64 {
    500
}

fn default_close_timeout_ms() -> u64 {
    5_000
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_enabled: default_reconnect_enabled(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            auto_ping: default_auto_ping(),
            idle_close_delay_ms: default_idle_close_delay_ms(),
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

impl std::fmt::Debug for WebSocketConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masker = SensitiveDataMasker::new();
        f.debug_struct("WebSocketConfig")
            .field("url", &masker.mask_string(&self.url))
            .field(
                "api_key",
                &self.api_key.as_deref().map(|key| masker.mask_value(key)),
            )
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("reconnect_enabled", &self.reconnect_enabled)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("max_reconnect_delay_ms", &self.max_reconnect_delay_ms)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("heartbeat_interval_ms", &self.heartbeat_interval_ms)
            .field("auto_ping", &self.auto_ping)
            .field("idle_close_delay_ms", &self.idle_close_delay_ms)
            .field("close_timeout_ms", &self.close_timeout_ms)
            .finish()
    }
}

impl WebSocketConfig {
    /// Creates a new builder for `WebSocketConfig`.
    #[must_use]
    pub fn builder() -> WebSocketConfigBuilder {
        WebSocketConfigBuilder::default()
    }

    /// Creates a configuration pointing at the venue's trading stream.
    #[must_use]
    pub fn from_decibel_config(config: &DecibelConfig, api_key: Option<String>) -> Self {
        Self {
            url: config.trading_ws_url.clone(),
            api_key,
            ..Self::default()
        }
    }

    /// Returns the connection timeout as a Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the reconnect delay as a Duration.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Returns the max reconnect delay as a Duration.
    #[must_use]
    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }

    /// Returns the heartbeat interval as a Duration.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Returns the idle close delay as a Duration.
    #[must_use]
    pub fn idle_close_delay(&self) -> Duration {
        Duration::from_millis(self.idle_close_delay_ms)
    }

    /// Returns the close timeout as a Duration.
    #[must_use]
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Calculates the delay before reconnection attempt `attempt` (0-based).
    ///
    /// `min(reconnect_delay * multiplier^attempt, max_reconnect_delay)`
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn calculate_reconnect_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.reconnect_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped_delay = delay.min(self.max_reconnect_delay_ms as f64) as u64;
        Duration::from_millis(capped_delay)
    }

    /// Returns whether another reconnection should be attempted after
    /// `attempt` consecutive failures.
    #[must_use]
    pub fn should_reconnect(&self, attempt: u32) -> bool {
        self.reconnect_enabled
            && (self.max_reconnect_attempts == 0 || attempt < self.max_reconnect_attempts)
    }
}

impl Validatable for WebSocketConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut ctx = ValidationContext::new();
        ctx.enter("ws");
        let mut v = Validator::new(&mut ctx);
        v.require_non_empty("url", &self.url)
            .ws_url("url", &self.url)
            .positive("connect_timeout_ms", &self.connect_timeout_ms)
            .positive("reconnect_delay_ms", &self.reconnect_delay_ms)
            .positive("heartbeat_interval_ms", &self.heartbeat_interval_ms)
            .in_range("backoff_multiplier", &self.backoff_multiplier, &1.0, &10.0)
            .custom(
                "max_reconnect_delay_ms",
                || self.max_reconnect_delay_ms >= self.reconnect_delay_ms,
                "Must not be below reconnect_delay_ms",
            );
        v.result()
    }
}

impl Configurable for WebSocketConfig {
    fn apply_env_overrides(&mut self, prefix: &str) {
        EnvOverride::apply_string(&format!("{prefix}_WS_URL"), &mut self.url);
        EnvOverride::apply_optional_string(&format!("{prefix}_API_KEY"), &mut self.api_key);
        EnvOverride::apply_bool(&format!("{prefix}_WS_RECONNECT"), &mut self.reconnect_enabled);
        EnvOverride::apply_number(
            &format!("{prefix}_WS_MAX_RECONNECT_ATTEMPTS"),
            &mut self.max_reconnect_attempts,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_WS_RECONNECT_DELAY_MS"),
            &mut self.reconnect_delay_ms,
        );
    }

    fn env_var_names(prefix: &str) -> Vec<String> {
        [
            "WS_URL",
            "API_KEY",
            "WS_RECONNECT",
            "WS_MAX_RECONNECT_ATTEMPTS",
            "WS_RECONNECT_DELAY_MS",
        ]
        .iter()
        .map(|name| format!("{prefix}_{name}"))
        .collect()
    }
}

/// Builder for `WebSocketConfig`.
#[derive(Debug, Default)]
pub struct WebSocketConfigBuilder {
    url: Option<String>,
    api_key: Option<String>,
    connect_timeout_ms: Option<u64>,
    reconnect_enabled: Option<bool>,
    max_reconnect_attempts: Option<u32>,
    reconnect_delay_ms: Option<u64>,
    max_reconnect_delay_ms: Option<u64>,
    backoff_multiplier: Option<f64>,
    heartbeat_interval_ms: Option<u64>,
    auto_ping: Option<bool>,
    idle_close_delay_ms: Option<u64>,
    close_timeout_ms: Option<u64>,
}

#[allow(clippy::cast_possible_truncation)]
impl WebSocketConfigBuilder {
    /// Sets the WebSocket URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Sets whether reconnection is enabled.
    #[must_use]
    pub fn reconnect_enabled(mut self, enabled: bool) -> Self {
        self.reconnect_enabled = Some(enabled);
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Sets the initial reconnection delay.
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    /// Sets the maximum reconnection delay.
    #[must_use]
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    /// Sets whether auto ping is enabled.
    #[must_use]
    pub fn auto_ping(mut self, enabled: bool) -> Self {
        self.auto_ping = Some(enabled);
        self
    }

    /// Sets the idle close delay.
    #[must_use]
    pub fn idle_close_delay(mut self, delay: Duration) -> Self {
        self.idle_close_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    /// Sets the close timeout.
    #[must_use]
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Builds the `WebSocketConfig`.
    #[must_use]
    pub fn build(self) -> WebSocketConfig {
        WebSocketConfig {
            url: self.url.unwrap_or_default(),
            api_key: self.api_key,
            connect_timeout_ms: self
                .connect_timeout_ms
                .unwrap_or_else(default_connect_timeout_ms),
            reconnect_enabled: self
                .reconnect_enabled
                .unwrap_or_else(default_reconnect_enabled),
            max_reconnect_attempts: self
                .max_reconnect_attempts
                .unwrap_or_else(default_max_reconnect_attempts),
            reconnect_delay_ms: self
                .reconnect_delay_ms
                .unwrap_or_else(default_reconnect_delay_ms),
            max_reconnect_delay_ms: self
                .max_reconnect_delay_ms
                .unwrap_or_else(default_max_reconnect_delay_ms),
            backoff_multiplier: self
                .backoff_multiplier
                .unwrap_or_else(default_backoff_multiplier),
            heartbeat_interval_ms: self
                .heartbeat_interval_ms
                .unwrap_or_else(default_heartbeat_interval_ms),
            auto_ping: self.auto_ping.unwrap_or_else(default_auto_ping),
            idle_close_delay_ms: self
                .idle_close_delay_ms
                .unwrap_or_else(default_idle_close_delay_ms),
            close_timeout_ms: self.close_timeout_ms.unwrap_or_else(default_close_timeout_ms),
        }
    }
}
