//! Pre-defined metrics for the streaming client.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Pre-defined metrics.
///
/// Naming: `decibel_<category>_<metric>_<unit>`. Topic labels carry the
/// stream kind, never the full topic, to keep cardinality bounded.
pub struct DecibelMetrics;

impl DecibelMetrics {
    /// Register all metric descriptions.
    pub fn register() {
        describe_counter!(
            "decibel_ws_messages_dispatched_total",
            "Inbound data messages routed to at least one callback"
        );
        describe_counter!(
            "decibel_ws_messages_unrouted_total",
            "Inbound data messages for topics with no live callback"
        );
        describe_counter!(
            "decibel_ws_protocol_errors_total",
            "Inbound frames that could not be parsed"
        );
        describe_counter!(
            "decibel_callback_failures_total",
            "Callbacks that returned an error, panicked or failed to decode"
        );
        describe_histogram!(
            "decibel_callback_duration_seconds",
            "Time spent in a single callback invocation"
        );

        describe_counter!(
            "decibel_ws_reconnect_attempts_total",
            "Connection attempts after the first"
        );
        describe_gauge!(
            "decibel_ws_connected",
            "Connection status (1=connected, 0=not connected)"
        );
        describe_gauge!(
            "decibel_ws_active_subscriptions",
            "Topics with at least one live callback"
        );
        describe_counter!(
            "decibel_ws_control_messages_total",
            "Subscribe and unsubscribe messages sent"
        );
    }

    /// Record a message delivered to the callbacks of a topic.
    pub fn message_dispatched(stream: &str) {
        counter!("decibel_ws_messages_dispatched_total", "stream" => stream.to_string())
            .increment(1);
    }

    /// Record a message whose topic has no callbacks.
    pub fn message_unrouted(stream: &str) {
        counter!("decibel_ws_messages_unrouted_total", "stream" => stream.to_string())
            .increment(1);
    }

    /// Record an unparseable inbound frame.
    pub fn protocol_error(kind: &str) {
        counter!("decibel_ws_protocol_errors_total", "kind" => kind.to_string()).increment(1);
    }

    /// Record a callback failure (`failed`, `panicked` or `decode`).
    pub fn callback_failure(stream: &str, kind: &str) {
        counter!(
            "decibel_callback_failures_total",
            "stream" => stream.to_string(),
            "kind" => kind.to_string()
        )
        .increment(1);
    }

    /// Record the duration of one callback invocation.
    pub fn callback_duration(stream: &str, seconds: f64) {
        histogram!("decibel_callback_duration_seconds", "stream" => stream.to_string())
            .record(seconds);
    }

    /// Record a reconnection attempt.
    pub fn reconnect_attempt() {
        counter!("decibel_ws_reconnect_attempts_total").increment(1);
    }

    /// Update connection status.
    pub fn connected(connected: bool) {
        gauge!("decibel_ws_connected").set(if connected { 1.0 } else { 0.0 });
    }

    /// Update the number of live topics.
    #[allow(clippy::cast_precision_loss)]
    pub fn active_subscriptions(count: usize) {
        gauge!("decibel_ws_active_subscriptions").set(count as f64);
    }

    /// Record a control message (`subscribe` or `unsubscribe`).
    pub fn control_message(method: &str) {
        counter!("decibel_ws_control_messages_total", "method" => method.to_string())
            .increment(1);
    }
}
