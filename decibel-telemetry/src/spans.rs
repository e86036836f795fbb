//! Span definitions for the streaming client.
//!
//! - One span per physical connection
//! - One span per dispatched message
//! - One span per subscription change

use tracing::{Span, debug_span, info_span};

/// Create a span covering one physical connection.
///
/// The URL should already be masked.
///
/// # Example
///
/// ```
/// use decibel_telemetry::spans::connection_span;
///
/// let span = connection_span("wss://api.testnet.aptoslabs.com/decibel/ws", 0);
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn connection_span(url: &str, attempt: u32) -> Span {
    info_span!(
        "ws.connection",
        url = %url,
        attempt = attempt,
        otel.kind = "client"
    )
}

/// Create a span for dispatching one inbound message to its callbacks.
#[must_use]
pub fn dispatch_span(topic: &str, callbacks: usize) -> Span {
    debug_span!("ws.dispatch", topic = %topic, callbacks = callbacks)
}

/// Create a span for a subscription change (`subscribe`, `unsubscribe`, `reset`).
#[must_use]
pub fn subscription_span(topic: &str, operation: &str) -> Span {
    info_span!(
        "ws.subscription",
        topic = %topic,
        operation = %operation
    )
}
