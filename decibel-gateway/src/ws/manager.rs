//! Subscription manager: one connection, many topic callbacks.
//!
//! All connection traffic goes through a single driver task. Public
//! operations update the registry and post a command; the driver reconciles
//! the server-side topic set with the registry, so a topic is subscribed
//! exactly while it has at least one live callback.

use decibel_core::error::{
    CallbackError, DecibelError, NetworkError, ProtocolError, SubscriptionError,
};
use decibel_core::types::Topic;
use decibel_telemetry::masking::SensitiveDataMasker;
use decibel_telemetry::metrics::DecibelMetrics;
use decibel_telemetry::spans::{connection_span, dispatch_span, subscription_span};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep, sleep_until, timeout};
use tracing::{Instrument, debug, info, warn};

use super::config::WebSocketConfig;
use super::message::{ControlMessage, InboundMessage, MessageCodec, WebSocketMessage};
use super::registry::{Callback, CallbackFailure, Entry, Removal, SubscriptionRegistry};
use super::state::{ConnectionState, InternalState};
use super::transport::{Connection, Transport, TungsteniteTransport};

/// Hook receiving errors that do not surface through a return value.
pub type ErrorHook = Arc<dyn Fn(&DecibelError) + Send + Sync>;

enum Command {
    /// Registry changed; reconcile server topics.
    Sync,
    /// Re-subscribe a topic to get a fresh snapshot.
    Reset(Topic),
}

struct DriverInputs {
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown: watch::Receiver<bool>,
}

struct Shared {
    config: WebSocketConfig,
    transport: Arc<dyn Transport>,
    codec: MessageCodec,
    registry: Mutex<SubscriptionRegistry>,
    state: RwLock<InternalState>,
    commands: mpsc::UnboundedSender<Command>,
    inputs: Mutex<Option<DriverInputs>>,
    shutdown: watch::Sender<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    next_id: AtomicU64,
    /// Bumped on every successful registration.
    registrations: AtomicU64,
    server_topics: Mutex<BTreeSet<Topic>>,
    on_error: Option<ErrorHook>,
}

/// Multiplexes topic subscriptions over one WebSocket connection.
///
/// # Features
///
/// - Lazy connect on first subscribe
/// - Reconnect with exponential backoff, replaying every live topic in
///   sorted order before reporting `Connected`
/// - Per-callback isolation: an error or panic in one callback never
///   reaches the others or the connection
/// - Idle close once the last subscription is gone
///
/// Share it as `Arc<SubscriptionManager>`. Dropping it without `close()`
/// stops the connection task in the background.
///
/// # Example
///
/// ```ignore
/// let manager = SubscriptionManager::new(config);
/// let handle = manager.subscribe(topic, |payload| println!("{payload}"))?;
/// handle.unsubscribe();
/// manager.close().await;
/// ```
pub struct SubscriptionManager {
    inner: Arc<Shared>,
}

/// Builder for [`SubscriptionManager`].
pub struct SubscriptionManagerBuilder {
    config: WebSocketConfig,
    transport: Option<Arc<dyn Transport>>,
    on_error: Option<ErrorHook>,
}

impl SubscriptionManagerBuilder {
    /// Uses a custom transport instead of `tokio-tungstenite`.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the error hook.
    #[must_use]
    pub fn on_error(mut self, hook: impl Fn(&DecibelError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Builds the manager. No connection is opened until the first subscribe.
    #[must_use]
    pub fn build(self) -> SubscriptionManager {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(TungsteniteTransport::from_config(&self.config)));
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        SubscriptionManager {
            inner: Arc::new(Shared {
                config: self.config,
                transport,
                codec: MessageCodec::new(),
                registry: Mutex::new(SubscriptionRegistry::new()),
                state: RwLock::new(InternalState::new()),
                commands,
                inputs: Mutex::new(Some(DriverInputs {
                    commands: command_rx,
                    shutdown: shutdown_rx,
                })),
                shutdown,
                driver: Mutex::new(None),
                closed: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                registrations: AtomicU64::new(0),
                server_topics: Mutex::new(BTreeSet::new()),
                on_error: self.on_error,
            }),
        }
    }
}

impl SubscriptionManager {
    /// Creates a manager using the `tokio-tungstenite` transport.
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self::builder(config).build()
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder(config: WebSocketConfig) -> SubscriptionManagerBuilder {
        SubscriptionManagerBuilder {
            config,
            transport: None,
            on_error: None,
        }
    }

    /// Registers a callback for raw JSON payloads of `topic`.
    ///
    /// # Errors
    ///
    /// `SubscriptionError::Closed` after `close()`, `NoRuntime` when called
    /// outside a Tokio runtime before the connection task exists.
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.register(
            topic,
            Arc::new(move |payload: &Value| {
                callback(payload);
                Ok(())
            }),
        )
    }

    /// Registers a fallible callback. Errors are reported as
    /// `CallbackError::Failed` and do not affect other callbacks.
    pub fn try_subscribe<F, E>(
        &self,
        topic: Topic,
        callback: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        F: Fn(&Value) -> Result<(), E> + Send + Sync + 'static,
        E: Display + 'static,
    {
        self.register(
            topic,
            Arc::new(move |payload: &Value| {
                callback(payload).map_err(|e| CallbackFailure::Failed(e.to_string()))
            }),
        )
    }

    /// Registers a callback receiving payloads decoded into `T`.
    ///
    /// A payload that does not decode is reported as `CallbackError::Decode`
    /// for this callback only.
    pub fn subscribe_typed<T, F>(
        &self,
        topic: Topic,
        callback: F,
    ) -> Result<CallbackHandle, SubscriptionError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.register(
            topic,
            Arc::new(move |payload: &Value| {
                let message =
                    T::deserialize(payload).map_err(|e| CallbackFailure::Decode(e.to_string()))?;
                callback(message);
                Ok(())
            }),
        )
    }

    fn register(&self, topic: Topic, callback: Callback) -> Result<CallbackHandle, SubscriptionError> {
        let shared = &self.inner;
        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));

        let (is_new, topic_count) = {
            let mut registry = shared.registry.lock();
            if shared.closed.load(Ordering::Acquire) {
                return Err(SubscriptionError::Closed);
            }
            let is_new = registry.insert(
                topic.clone(),
                Entry {
                    id,
                    active: Arc::clone(&active),
                    callback,
                },
            );
            (is_new, registry.len())
        };

        if let Err(e) = shared.ensure_driver() {
            shared.registry.lock().remove(&topic, id);
            return Err(e);
        }

        {
            let mut state = shared.state.write();
            if state.state == ConnectionState::Disconnected {
                state.mark_connecting();
            }
        }

        shared.registrations.fetch_add(1, Ordering::AcqRel);
        if is_new {
            debug!(topic = %topic, "New topic registered");
            DecibelMetrics::active_subscriptions(topic_count);
        }
        let _ = shared.commands.send(Command::Sync);

        Ok(CallbackHandle {
            shared: Arc::downgrade(shared),
            topic,
            id,
            active,
            fired: AtomicBool::new(false),
        })
    }

    /// Requests a fresh snapshot for `topic` by re-subscribing it.
    ///
    /// No-op unless the topic has live callbacks; the driver only acts if
    /// the topic is subscribed on the current connection.
    pub fn reset(&self, topic: &Topic) {
        let shared = &self.inner;
        if shared.closed.load(Ordering::Acquire) || !shared.registry.lock().contains(topic) {
            return;
        }
        let _ = shared.commands.send(Command::Reset(topic.clone()));
    }

    /// Closes the manager.
    ///
    /// Drops every callback, unsubscribes server-side topics on a best-effort
    /// basis and stops the connection task, waiting at most `close_timeout`.
    /// Calling it again, even concurrently, returns immediately.
    pub async fn close(&self) {
        let shared = &self.inner;
        if shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        shared.state.write().mark_closing();
        shared.registry.lock().clear();
        shared.shutdown.send_replace(true);

        let handle = shared.driver.lock().take();
        if let Some(mut handle) = handle
            && timeout(shared.config.close_timeout(), &mut handle).await.is_err()
        {
            warn!(
                timeout_ms = shared.config.close_timeout_ms,
                "Connection task did not stop in time, aborting"
            );
            handle.abort();
        }

        shared.server_topics.lock().clear();
        shared.state.write().mark_closed();
        DecibelMetrics::connected(false);
        DecibelMetrics::active_subscriptions(0);
        info!("Subscription manager closed");
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.read().state
    }

    /// Returns whether the manager is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Topics with at least one live callback, sorted.
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<Topic> {
        self.inner.registry.lock().topics()
    }

    /// Topics subscribed on the current connection, sorted.
    #[must_use]
    pub fn server_topics(&self) -> Vec<Topic> {
        self.inner.server_topics.lock().iter().cloned().collect()
    }

    /// Consecutive reconnection attempts since the last successful connect.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.state.read().reconnect_attempts
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WebSocketConfig {
        &self.inner.config
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        let shared = &self.inner;
        if !shared.closed.swap(true, Ordering::AcqRel) {
            shared.registry.lock().clear();
            shared.shutdown.send_replace(true);
            shared.state.write().mark_closed();
        }
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("state", &self.state())
            .field("topics", &self.inner.registry.lock().len())
            .finish_non_exhaustive()
    }
}

/// Token for one registered callback.
///
/// Dropping the handle keeps the callback registered; call
/// [`CallbackHandle::unsubscribe`] to remove it.
pub struct CallbackHandle {
    shared: Weak<Shared>,
    topic: Topic,
    id: u64,
    active: Arc<AtomicBool>,
    fired: AtomicBool,
}

impl CallbackHandle {
    /// Removes this callback. Only the first call has an effect.
    ///
    /// Removing the last callback of a topic unsubscribes it server-side.
    pub fn unsubscribe(&self) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        self.active.store(false, Ordering::Release);

        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let (removal, remaining) = {
            let mut registry = shared.registry.lock();
            (registry.remove(&self.topic, self.id), registry.len())
        };
        if removal == Removal::TopicEmptied {
            debug!(topic = %self.topic, "Last callback removed");
            DecibelMetrics::active_subscriptions(remaining);
            let _ = shared.commands.send(Command::Sync);
        }
    }

    /// The topic this callback is registered for.
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Returns false once unsubscribed or after the manager closed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

enum Establish {
    Connected(Box<dyn Connection>),
    /// Registry emptied while connecting.
    NoDemand,
    /// Gave up; wait for the next command.
    GaveUp(NetworkError),
    Shutdown,
}

enum SessionEnd {
    Dropped,
    Idle,
    Shutdown,
}

impl Shared {
    fn ensure_driver(self: &Arc<Self>) -> Result<(), SubscriptionError> {
        let mut driver = self.driver.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(SubscriptionError::Closed);
        }
        if driver.is_some() {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|_| SubscriptionError::NoRuntime)?;
        let Some(inputs) = self.inputs.lock().take() else {
            return Err(SubscriptionError::Closed);
        };
        *driver = Some(runtime.spawn(run_driver(Arc::clone(self), inputs)));
        Ok(())
    }

    fn has_demand(&self) -> bool {
        !self.registry.lock().is_empty()
    }

    fn masked_url(&self) -> String {
        SensitiveDataMasker::new()
            .mask_string(&self.config.url)
            .into_owned()
    }

    fn report(&self, error: &DecibelError) {
        if let Some(hook) = &self.on_error
            && catch_unwind(AssertUnwindSafe(|| hook(error))).is_err()
        {
            warn!("Error hook panicked");
        }
    }

    fn dispatch(&self, frame: &WebSocketMessage) {
        match self.codec.decode(frame) {
            Ok(InboundMessage::Data { topic, payload }) => self.dispatch_data(&topic, &payload),
            Ok(InboundMessage::Response(response)) => {
                debug!(response = %response, "Control response");
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed message");
                DecibelMetrics::protocol_error(protocol_error_kind(&e));
                self.report(&DecibelError::Protocol(e));
            }
        }
    }

    fn dispatch_data(&self, topic: &Topic, payload: &Value) {
        let entries = self.registry.lock().snapshot(topic);
        let stream = topic.kind().map_or("other", |kind| kind.as_str());

        if entries.is_empty() {
            debug!(topic = %topic, "No callbacks for topic, dropping message");
            DecibelMetrics::message_unrouted(stream);
            return;
        }

        let _span = dispatch_span(topic.as_str(), entries.len()).entered();
        DecibelMetrics::message_dispatched(stream);

        for entry in entries {
            if self.closed.load(Ordering::Acquire) {
                break;
            }
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }

            let started = std::time::Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(|| (entry.callback)(payload)));
            DecibelMetrics::callback_duration(stream, started.elapsed().as_secs_f64());

            let topic_name = topic.to_string();
            let (error, kind) = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(CallbackFailure::Failed(reason))) => (
                    CallbackError::Failed {
                        topic: topic_name,
                        reason,
                    },
                    "failed",
                ),
                Ok(Err(CallbackFailure::Decode(reason))) => (
                    CallbackError::Decode {
                        topic: topic_name,
                        reason,
                    },
                    "decode",
                ),
                Err(panic) => (
                    CallbackError::Panicked {
                        topic: topic_name,
                        message: panic_message(panic.as_ref()),
                    },
                    "panicked",
                ),
            };

            warn!(topic = %topic, callback = entry.id, error = %error, "Callback failed");
            DecibelMetrics::callback_failure(stream, kind);
            self.report(&DecibelError::Callback(error));
        }
    }
}

fn protocol_error_kind(error: &ProtocolError) -> &'static str {
    match error {
        ProtocolError::InvalidJson { .. } => "invalid_json",
        ProtocolError::MissingTopic { .. } => "missing_topic",
        ProtocolError::UnsupportedFrame { .. } => "unsupported_frame",
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run_driver(shared: Arc<Shared>, inputs: DriverInputs) {
    let DriverInputs {
        mut commands,
        mut shutdown,
    } = inputs;
    let mut after_drop = false;

    loop {
        while !shared.has_demand() {
            shared.state.write().mark_disconnected();
            if wait_for_command(&mut commands, &mut shutdown).await.is_none() {
                return;
            }
        }

        let registrations = shared.registrations.load(Ordering::Acquire);
        match establish(&shared, &mut shutdown, after_drop).await {
            Establish::Connected(conn) => {
                match run_session(&shared, conn, &mut commands, &mut shutdown).await {
                    SessionEnd::Dropped => after_drop = true,
                    SessionEnd::Idle => after_drop = false,
                    SessionEnd::Shutdown => return,
                }
            }
            Establish::NoDemand => after_drop = false,
            Establish::GaveUp(error) => {
                warn!(error = %error, "Giving up on connection until the next subscription change");
                shared.state.write().mark_disconnected();
                shared.report(&DecibelError::Network(error));
                after_drop = false;

                // Subscriptions made while connecting retry right away; stale
                // commands from before the attempt do not.
                while commands.try_recv().is_ok() {}
                if shared.registrations.load(Ordering::Acquire) == registrations
                    && wait_for_command(&mut commands, &mut shutdown).await.is_none()
                {
                    return;
                }
            }
            Establish::Shutdown => return,
        }
    }
}

/// Waits for a command. `None` means shut down.
async fn wait_for_command(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<Command> {
    if *shutdown.borrow() {
        return None;
    }
    tokio::select! {
        biased;
        _ = shutdown.changed() => None,
        command = commands.recv() => command,
    }
}

async fn establish(
    shared: &Shared,
    shutdown: &mut watch::Receiver<bool>,
    after_drop: bool,
) -> Establish {
    let config = &shared.config;
    let url = shared.masked_url();
    let mut retries: u32 = 0;
    let mut first = !after_drop;

    loop {
        if *shutdown.borrow() {
            return Establish::Shutdown;
        }
        if !shared.has_demand() {
            return Establish::NoDemand;
        }

        if first {
            first = false;
            shared.state.write().mark_connecting();
        } else {
            if !config.should_reconnect(retries) {
                return Establish::GaveUp(NetworkError::ReconnectExhausted { attempts: retries });
            }
            let delay = config.calculate_reconnect_delay(retries);
            retries += 1;
            shared.state.write().mark_reconnecting();
            DecibelMetrics::reconnect_attempt();
            info!(
                attempt = retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting"
            );

            tokio::select! {
                biased;
                _ = shutdown.changed() => return Establish::Shutdown,
                () = sleep(delay) => {}
            }
            if !shared.has_demand() {
                return Establish::NoDemand;
            }
        }

        let attempt = tokio::select! {
            biased;
            _ = shutdown.changed() => return Establish::Shutdown,
            result = timeout(config.connect_timeout(), shared.transport.connect())
                .instrument(connection_span(&url, retries)) => result,
        };

        let error = match attempt {
            Ok(Ok(conn)) => return Establish::Connected(conn),
            Ok(Err(e)) => e,
            Err(_) => NetworkError::Timeout {
                timeout_ms: config.connect_timeout_ms,
            },
        };

        warn!(url = %url, attempt = retries, error = %error, "Connection attempt failed");
        if !error.is_recoverable() {
            return Establish::GaveUp(error);
        }
        shared.report(&DecibelError::Network(error));
    }
}

async fn run_session(
    shared: &Shared,
    mut conn: Box<dyn Connection>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let config = &shared.config;

    let topics = shared.registry.lock().topics();
    for topic in &topics {
        shared.server_topics.lock().insert(topic.clone());
        if let Err(e) = send_control(shared, &mut conn, ControlMessage::subscribe(topic.clone())).await {
            warn!(error = %e, "Connection lost while replaying subscriptions");
            return teardown(shared, conn, SessionEnd::Dropped).await;
        }
    }

    shared.state.write().mark_connected();
    DecibelMetrics::connected(true);
    info!(url = %shared.masked_url(), topics = topics.len(), "WebSocket connected");

    let period = config.heartbeat_interval().max(std::time::Duration::from_millis(1));
    let mut heartbeat = interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut idle_deadline = topics
        .is_empty()
        .then(|| Instant::now() + config.idle_close_delay());

    let end = loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break SessionEnd::Shutdown,
            Some(command) = commands.recv() => {
                let result = match command {
                    Command::Sync => reconcile(shared, &mut conn, &mut idle_deadline).await,
                    Command::Reset(topic) => reset_topic(shared, &mut conn, topic).await,
                };
                if let Err(e) = result {
                    warn!(error = %e, "Failed to send control message");
                    break SessionEnd::Dropped;
                }
            }
            frame = conn.recv() => match frame {
                Some(Ok(WebSocketMessage::Close(reason))) => {
                    info!(reason = ?reason, "Server closed connection");
                    break SessionEnd::Dropped;
                }
                Some(Ok(frame)) if frame.is_control_frame() => {}
                Some(Ok(frame)) => shared.dispatch(&frame),
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    break SessionEnd::Dropped;
                }
                None => {
                    info!("WebSocket stream ended");
                    break SessionEnd::Dropped;
                }
            },
            () = wait_until(idle_deadline) => {
                if shared.has_demand() {
                    idle_deadline = None;
                } else {
                    info!("No subscriptions left, closing idle connection");
                    break SessionEnd::Idle;
                }
            }
            _ = heartbeat.tick(), if config.auto_ping => {
                if let Err(e) = conn.send(WebSocketMessage::ping(Vec::new())).await {
                    warn!(error = %e, "Failed to send ping");
                    break SessionEnd::Dropped;
                }
            }
        }
    };

    teardown(shared, conn, end).await
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn teardown(shared: &Shared, mut conn: Box<dyn Connection>, end: SessionEnd) -> SessionEnd {
    if !matches!(end, SessionEnd::Dropped) {
        let topics: Vec<Topic> = shared.server_topics.lock().iter().cloned().collect();
        for topic in topics {
            if send_control(shared, &mut conn, ControlMessage::unsubscribe(topic))
                .await
                .is_err()
            {
                break;
            }
        }
        conn.close().await;
    }

    shared.server_topics.lock().clear();
    shared.state.write().mark_disconnected();
    DecibelMetrics::connected(false);
    end
}

/// Brings server topics in line with the registry.
async fn reconcile(
    shared: &Shared,
    conn: &mut Box<dyn Connection>,
    idle_deadline: &mut Option<Instant>,
) -> Result<(), NetworkError> {
    let desired: BTreeSet<Topic> = shared.registry.lock().topics().into_iter().collect();
    let (stale, missing) = {
        let active = shared.server_topics.lock();
        let stale: Vec<Topic> = active.difference(&desired).cloned().collect();
        let missing: Vec<Topic> = desired.difference(&active).cloned().collect();
        (stale, missing)
    };

    for topic in stale {
        shared.server_topics.lock().remove(&topic);
        send_control(shared, conn, ControlMessage::unsubscribe(topic)).await?;
    }
    for topic in missing {
        shared.server_topics.lock().insert(topic.clone());
        send_control(shared, conn, ControlMessage::subscribe(topic)).await?;
    }

    if desired.is_empty() {
        idle_deadline.get_or_insert_with(|| Instant::now() + shared.config.idle_close_delay());
    } else {
        *idle_deadline = None;
    }
    Ok(())
}

async fn reset_topic(
    shared: &Shared,
    conn: &mut Box<dyn Connection>,
    topic: Topic,
) -> Result<(), NetworkError> {
    if !shared.server_topics.lock().contains(&topic) {
        debug!(topic = %topic, "Reset skipped, topic not active on connection");
        return Ok(());
    }
    send_control(shared, conn, ControlMessage::unsubscribe(topic.clone())).await?;
    send_control(shared, conn, ControlMessage::subscribe(topic)).await
}

async fn send_control(
    shared: &Shared,
    conn: &mut Box<dyn Connection>,
    message: ControlMessage,
) -> Result<(), NetworkError> {
    let method = message.method.as_str();
    let span = subscription_span(message.topic.as_str(), method);
    let frame = shared.codec.encode_control(&message)?;

    conn.send(frame).instrument(span).await?;
    DecibelMetrics::control_message(method);
    debug!(topic = %message.topic, method, "Sent control message");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::testing::{MockServer, MockTransport, test_config};
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        manager: SubscriptionManager,
        transport: Arc<MockTransport>,
        servers: mpsc::UnboundedReceiver<MockServer>,
        errors: mpsc::UnboundedReceiver<DecibelError>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(test_config())
        }

        fn with_config(config: WebSocketConfig) -> Self {
            let (transport, servers) = MockTransport::new();
            let (errors_tx, errors) = mpsc::unbounded_channel();

            let manager = SubscriptionManager::builder(config)
                .transport(Arc::clone(&transport) as Arc<dyn Transport>)
                .on_error(move |e| {
                    let _ = errors_tx.send(e.clone());
                })
                .build();

            Self {
                manager,
                transport,
                servers,
                errors,
            }
        }

        async fn next_server(&mut self) -> MockServer {
            tokio::time::timeout(Duration::from_secs(2), self.servers.recv())
                .await
                .expect("timed out waiting for connection")
                .expect("transport dropped")
        }

        async fn next_error(&mut self) -> DecibelError {
            tokio::time::timeout(Duration::from_secs(2), self.errors.recv())
                .await
                .expect("timed out waiting for error")
                .expect("hook dropped")
        }

        async fn wait_for_state(&self, expected: ConnectionState) {
            tokio::time::timeout(Duration::from_secs(2), async {
                while self.manager.state() != expected {
                    sleep(Duration::from_millis(2)).await;
                }
            })
            .await
            .unwrap_or_else(|_| panic!("state {expected} not reached, got {}", self.manager.state()));
        }
    }

    fn topic(name: &str) -> Topic {
        Topic::new_unchecked(name)
    }

    fn control(method: &str, topic: &str) -> Value {
        json!({"method": method, "topic": topic})
    }

    fn collector() -> (
        impl Fn(&Value) + Send + Sync + 'static,
        mpsc::UnboundedReceiver<Value>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |payload: &Value| {
                let _ = tx.send(payload.clone());
            },
            rx,
        )
    }

    async fn recv_payload(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for payload")
            .expect("callback dropped")
    }

    #[tokio::test]
    async fn test_subscribe_connects_and_delivers() {
        let mut h = Harness::new();
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);

        let (callback, mut rx) = collector();
        let handle = h.manager.subscribe(topic("BTC/USD:price"), callback).unwrap();
        assert_ne!(h.manager.state(), ConnectionState::Disconnected);

        let mut server = h.next_server().await;
        assert_eq!(server.next_control().await, control("subscribe", "BTC/USD:price"));
        h.wait_for_state(ConnectionState::Connected).await;

        server.push(json!({"topic": "BTC/USD:price", "price": 1}));
        assert_eq!(recv_payload(&mut rx).await, json!({"price": 1}));

        handle.unsubscribe();
        assert_eq!(server.next_control().await, control("unsubscribe", "BTC/USD:price"));

        server.push(json!({"topic": "BTC/USD:price", "price": 2}));
        sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_one_subscribe_per_topic() {
        let mut h = Harness::new();
        let (first, mut first_rx) = collector();
        let (second, mut second_rx) = collector();

        let a = h.manager.subscribe(topic("trades:0x1"), first).unwrap();
        let b = h.manager.subscribe(topic("trades:0x1"), second).unwrap();

        let mut server = h.next_server().await;
        assert_eq!(server.next_control().await, control("subscribe", "trades:0x1"));

        server.push(json!({"topic": "trades:0x1", "trades": []}));
        assert_eq!(recv_payload(&mut first_rx).await, json!({"trades": []}));
        assert_eq!(recv_payload(&mut second_rx).await, json!({"trades": []}));

        // Removing one of two callbacks keeps the server subscription.
        a.unsubscribe();
        let (other, _other_rx) = collector();
        let _c = h.manager.subscribe(topic("trades:0x2"), other).unwrap();
        assert_eq!(server.next_control().await, control("subscribe", "trades:0x2"));
        assert_eq!(
            h.manager.server_topics(),
            vec![topic("trades:0x1"), topic("trades:0x2")]
        );

        b.unsubscribe();
        assert_eq!(server.next_control().await, control("unsubscribe", "trades:0x1"));
        assert_eq!(h.manager.subscribed_topics(), vec![topic("trades:0x2")]);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let mut h = Harness::new();
        let (callback, _rx) = collector();
        let handle = h.manager.subscribe(topic("a"), callback).unwrap();
        let mut server = h.next_server().await;
        server.next_control().await;

        handle.unsubscribe();
        handle.unsubscribe();
        assert!(!handle.is_active());
        assert_eq!(server.next_control().await, control("unsubscribe", "a"));

        // A second unsubscribe frame would arrive before this subscribe.
        let (callback, _rx) = collector();
        let _b = h.manager.subscribe(topic("b"), callback).unwrap();
        assert_eq!(server.next_control().await, control("subscribe", "b"));
    }

    #[tokio::test]
    async fn test_dropping_handle_keeps_callback() {
        let mut h = Harness::new();
        let (callback, mut rx) = collector();
        drop(h.manager.subscribe(topic("a"), callback).unwrap());

        let mut server = h.next_server().await;
        server.next_control().await;
        server.push(json!({"topic": "a", "n": 1}));
        assert_eq!(recv_payload(&mut rx).await, json!({"n": 1}));
        assert_eq!(h.manager.subscribed_topics(), vec![topic("a")]);
    }

    #[tokio::test]
    async fn test_reconnect_replays_live_topics() {
        let mut h = Harness::new();
        let (cb, _rx) = collector();
        let _c = h.manager.subscribe(topic("c"), cb).unwrap();
        let (cb, _rx) = collector();
        let a = h.manager.subscribe(topic("a"), cb).unwrap();
        let (cb, mut b_rx) = collector();
        let _b = h.manager.subscribe(topic("b"), cb).unwrap();

        let mut server = h.next_server().await;
        for _ in 0..3 {
            server.next_control().await;
        }
        h.wait_for_state(ConnectionState::Connected).await;

        a.unsubscribe();
        assert_eq!(server.next_control().await, control("unsubscribe", "a"));

        server.drop_connection();
        let mut server = h.next_server().await;
        assert_eq!(server.next_control().await, control("subscribe", "b"));
        assert_eq!(server.next_control().await, control("subscribe", "c"));
        h.wait_for_state(ConnectionState::Connected).await;
        assert_eq!(h.manager.reconnect_attempts(), 0);
        assert_eq!(h.manager.server_topics(), vec![topic("b"), topic("c")]);

        server.push(json!({"topic": "b", "v": true}));
        assert_eq!(recv_payload(&mut b_rx).await, json!({"v": true}));
    }

    #[tokio::test]
    async fn test_reconnect_retries_failed_attempts() {
        let mut h = Harness::new();
        let (cb, _rx) = collector();
        let _a = h.manager.subscribe(topic("a"), cb).unwrap();
        let server = h.next_server().await;
        h.wait_for_state(ConnectionState::Connected).await;

        h.transport.failures_left.store(2, Ordering::SeqCst);
        server.drop_connection();

        let mut server = h.next_server().await;
        assert_eq!(server.next_control().await, control("subscribe", "a"));
        h.wait_for_state(ConnectionState::Connected).await;
        assert_eq!(h.transport.connects.load(Ordering::SeqCst), 4);

        for _ in 0..2 {
            assert!(matches!(
                h.next_error().await,
                DecibelError::Network(NetworkError::ConnectionFailed { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_failing_callbacks_are_isolated() {
        let mut h = Harness::new();
        let _panicking = h
            .manager
            .subscribe(topic("a"), |_| panic!("listener exploded"))
            .unwrap();
        let _failing = h
            .manager
            .try_subscribe(topic("a"), |_| Err::<(), _>("rejected"))
            .unwrap();
        let (callback, mut rx) = collector();
        let _healthy = h.manager.subscribe(topic("a"), callback).unwrap();

        let mut server = h.next_server().await;
        server.next_control().await;
        server.push(json!({"topic": "a", "n": 1}));
        server.push(json!({"topic": "a", "n": 2}));

        assert_eq!(recv_payload(&mut rx).await, json!({"n": 1}));
        assert_eq!(recv_payload(&mut rx).await, json!({"n": 2}));

        match h.next_error().await {
            DecibelError::Callback(CallbackError::Panicked { topic, message }) => {
                assert_eq!(topic, "a");
                assert_eq!(message, "listener exploded");
            }
            other => panic!("unexpected error {other:?}"),
        }
        match h.next_error().await {
            DecibelError::Callback(CallbackError::Failed { reason, .. }) => {
                assert_eq!(reason, "rejected");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(h.manager.is_connected());
    }

    #[tokio::test]
    async fn test_failing_callback_does_not_affect_other_topics() {
        let mut h = Harness::new();
        let _panicking = h
            .manager
            .subscribe(topic("a"), |_| panic!("listener exploded"))
            .unwrap();
        let (callback, mut rx) = collector();
        let _healthy = h.manager.subscribe(topic("b"), callback).unwrap();

        let mut server = h.next_server().await;
        server.next_control().await;
        server.next_control().await;

        for n in 0..3 {
            server.push(json!({"topic": "a", "n": n}));
            server.push(json!({"topic": "b", "n": n}));
        }
        for n in 0..3 {
            assert_eq!(recv_payload(&mut rx).await, json!({"n": n}));
        }
        for _ in 0..3 {
            assert!(matches!(
                h.next_error().await,
                DecibelError::Callback(CallbackError::Panicked { .. })
            ));
        }
        assert!(h.manager.is_connected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribe_unsubscribe_and_close() {
        let (transport, mut servers) = MockTransport::new();
        let manager = Arc::new(
            SubscriptionManager::builder(test_config())
                .transport(Arc::clone(&transport) as Arc<dyn Transport>)
                .build(),
        );

        let mut tasks = Vec::new();
        for worker in 0..8u32 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                let mut kept = Vec::new();
                for round in 0..50u32 {
                    let name = format!("t{}", (worker + round) % 6);
                    let handle = manager.subscribe(topic(&name), |_| {}).unwrap();
                    if round % 3 == 0 {
                        kept.push(handle);
                    } else {
                        handle.unsubscribe();
                    }
                    tokio::task::yield_now().await;
                }
                kept
            }));
        }

        let mut kept = Vec::new();
        for task in tasks {
            kept.extend(task.await.unwrap());
        }
        let expected: Vec<Topic> = kept
            .iter()
            .map(|handle| handle.topic().clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let _server = tokio::time::timeout(Duration::from_secs(2), servers.recv())
            .await
            .expect("timed out waiting for connection")
            .expect("transport dropped");
        tokio::time::timeout(Duration::from_secs(2), async {
            while manager.server_topics() != expected || !manager.is_connected() {
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("server topics never matched live callbacks");
        assert_eq!(manager.subscribed_topics(), expected);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);

        let closers: Vec<_> = (0..3)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.close().await })
            })
            .collect();
        for closer in closers {
            closer.await.unwrap();
        }

        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(manager.subscribed_topics().is_empty());
        assert!(manager.server_topics().is_empty());
        assert!(kept.iter().all(|handle| !handle.is_active()));
        assert_eq!(
            manager.subscribe(topic("late"), |_| {}).err(),
            Some(SubscriptionError::Closed)
        );
    }

    #[tokio::test]
    async fn test_typed_decode_failure() {
        #[derive(Deserialize)]
        struct Price {
            mark_px: f64,
        }

        let mut h = Harness::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _typed = h
            .manager
            .subscribe_typed(topic("p"), move |price: Price| {
                let _ = tx.send(price.mark_px);
            })
            .unwrap();

        let mut server = h.next_server().await;
        server.next_control().await;
        server.push(json!({"topic": "p", "mark_px": "oops"}));
        server.push(json!({"topic": "p", "mark_px": 101.5}));

        assert!(matches!(
            h.next_error().await,
            DecibelError::Callback(CallbackError::Decode { .. })
        ));
        let price = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!((price - 101.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_malformed_and_unrouted_messages_are_dropped() {
        let mut h = Harness::new();
        let (callback, mut rx) = collector();
        let _a = h.manager.subscribe(topic("a"), callback).unwrap();
        let mut server = h.next_server().await;
        server.next_control().await;

        server.push_raw("{not json");
        server.push(json!({"no_topic": true}));
        server.push(json!({"success": true, "topic": "a"}));
        server.push(json!({"topic": "unknown", "n": 0}));
        server.push(json!({"topic": "a", "n": 1}));

        assert_eq!(recv_payload(&mut rx).await, json!({"n": 1}));
        assert!(matches!(
            h.next_error().await,
            DecibelError::Protocol(ProtocolError::InvalidJson { .. })
        ));
        assert!(matches!(
            h.next_error().await,
            DecibelError::Protocol(ProtocolError::MissingTopic { .. })
        ));
        assert!(h.errors.try_recv().is_err());
        assert!(h.manager.is_connected());
    }

    #[tokio::test]
    async fn test_reset_resubscribes_active_topic() {
        let mut h = Harness::new();
        let (callback, _rx) = collector();
        let _a = h.manager.subscribe(topic("depth:0x1:1"), callback).unwrap();
        let mut server = h.next_server().await;
        server.next_control().await;

        h.manager.reset(&topic("depth:0x1:1"));
        assert_eq!(server.next_control().await, control("unsubscribe", "depth:0x1:1"));
        assert_eq!(server.next_control().await, control("subscribe", "depth:0x1:1"));

        // Unknown topics are ignored.
        h.manager.reset(&topic("depth:0x2:1"));
        let (callback, _rx) = collector();
        let _b = h.manager.subscribe(topic("z"), callback).unwrap();
        assert_eq!(server.next_control().await, control("subscribe", "z"));
    }

    #[tokio::test]
    async fn test_idle_close_and_lazy_reconnect() {
        let mut h = Harness::new();
        let (callback, _rx) = collector();
        let handle = h.manager.subscribe(topic("a"), callback).unwrap();
        let mut server = h.next_server().await;
        server.next_control().await;
        h.wait_for_state(ConnectionState::Connected).await;

        handle.unsubscribe();
        assert_eq!(server.next_control().await, control("unsubscribe", "a"));
        server.closed().await;
        h.wait_for_state(ConnectionState::Disconnected).await;
        assert!(h.manager.server_topics().is_empty());

        let (callback, _rx) = collector();
        let _b = h.manager.subscribe(topic("b"), callback).unwrap();
        let mut server = h.next_server().await;
        assert_eq!(server.next_control().await, control("subscribe", "b"));
        assert_eq!(h.transport.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_subscription_during_idle_delay_keeps_connection() {
        let mut h = Harness::new();
        let (callback, _rx) = collector();
        let first = h.manager.subscribe(topic("a"), callback).unwrap();
        let mut server = h.next_server().await;
        server.next_control().await;

        first.unsubscribe();
        let (callback, _rx) = collector();
        let _second = h.manager.subscribe(topic("b"), callback).unwrap();

        let mut controls = vec![server.next_control().await];
        while controls.len() < 2 {
            controls.push(server.next_control().await);
        }
        assert!(controls.contains(&control("subscribe", "b")));

        sleep(Duration::from_millis(80)).await;
        assert!(h.manager.is_connected());
        assert_eq!(h.transport.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconnect_exhaustion() {
        let config = WebSocketConfig {
            max_reconnect_attempts: 2,
            ..test_config()
        };
        let mut h = Harness::with_config(config);
        h.transport.failures_left.store(u32::MAX, Ordering::SeqCst);

        let (callback, _rx) = collector();
        let _a = h.manager.subscribe(topic("a"), callback).unwrap();

        let exhausted = loop {
            match h.next_error().await {
                DecibelError::Network(NetworkError::ReconnectExhausted { attempts }) => {
                    break attempts;
                }
                DecibelError::Network(NetworkError::ConnectionFailed { .. }) => {}
                other => panic!("unexpected error {other:?}"),
            }
        };
        assert_eq!(exhausted, 2);
        assert_eq!(h.transport.connects.load(Ordering::SeqCst), 3);
        h.wait_for_state(ConnectionState::Disconnected).await;

        // The next subscription change starts a fresh attempt.
        h.transport.failures_left.store(0, Ordering::SeqCst);
        let (callback, _rx) = collector();
        let _b = h.manager.subscribe(topic("b"), callback).unwrap();
        let mut server = h.next_server().await;
        assert_eq!(server.next_control().await, control("subscribe", "a"));
        assert_eq!(server.next_control().await, control("subscribe", "b"));
        h.wait_for_state(ConnectionState::Connected).await;
    }

    #[tokio::test]
    async fn test_subscription_during_final_backoff_reconnects() {
        let config = WebSocketConfig {
            max_reconnect_attempts: 1,
            reconnect_delay_ms: 200,
            max_reconnect_delay_ms: 200,
            ..test_config()
        };
        let mut h = Harness::with_config(config);
        h.transport.failures_left.store(2, Ordering::SeqCst);

        let (callback, _rx) = collector();
        let _a = h.manager.subscribe(topic("a"), callback).unwrap();
        assert!(matches!(
            h.next_error().await,
            DecibelError::Network(NetworkError::ConnectionFailed { .. })
        ));

        // Registered while the last retry is still pending.
        let (callback, _rx) = collector();
        let _b = h.manager.subscribe(topic("b"), callback).unwrap();

        assert!(matches!(
            h.next_error().await,
            DecibelError::Network(NetworkError::ConnectionFailed { .. })
        ));
        assert!(matches!(
            h.next_error().await,
            DecibelError::Network(NetworkError::ReconnectExhausted { attempts: 1 })
        ));

        let mut server = h.next_server().await;
        assert_eq!(server.next_control().await, control("subscribe", "a"));
        assert_eq!(server.next_control().await, control("subscribe", "b"));
        h.wait_for_state(ConnectionState::Connected).await;
        assert_eq!(h.transport.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_close_stops_everything() {
        let mut h = Harness::new();
        let (callback, mut rx) = collector();
        let handle = h.manager.subscribe(topic("a"), callback).unwrap();
        let mut server = h.next_server().await;
        server.next_control().await;
        h.wait_for_state(ConnectionState::Connected).await;

        h.manager.close().await;
        assert_eq!(h.manager.state(), ConnectionState::Closed);
        assert!(!handle.is_active());
        assert!(h.manager.subscribed_topics().is_empty());
        assert_eq!(server.next_control().await, control("unsubscribe", "a"));
        server.closed().await;

        server.push(json!({"topic": "a", "n": 1}));
        sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());

        let (callback, _rx) = collector();
        assert_eq!(
            h.manager.subscribe(topic("b"), callback).err(),
            Some(SubscriptionError::Closed)
        );
        handle.unsubscribe();
        h.manager.close().await;
        assert_eq!(h.manager.state(), ConnectionState::Closed);
        assert_eq!(h.transport.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_interrupts_backoff() {
        let config = WebSocketConfig {
            reconnect_delay_ms: 60_000,
            max_reconnect_delay_ms: 60_000,
            ..test_config()
        };
        let mut h = Harness::with_config(config);
        h.transport.failures_left.store(u32::MAX, Ordering::SeqCst);
        let (callback, _rx) = collector();
        let _a = h.manager.subscribe(topic("a"), callback).unwrap();
        h.next_error().await;

        let started = std::time::Instant::now();
        h.manager.close().await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(h.manager.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_subscribe_requires_runtime() {
        let manager = SubscriptionManager::new(test_config());
        let result = manager.subscribe(topic("a"), |_| {});
        assert_eq!(result.err(), Some(SubscriptionError::NoRuntime));
        assert!(manager.subscribed_topics().is_empty());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
