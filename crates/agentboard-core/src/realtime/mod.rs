// ── Realtime connection manager ──
//
// Owns the single realtime channel to the dashboard backend: opens it,
// re-opens it with exponential backoff when it drops, keeps it alive with
// heartbeats, falls back to HTTP polling once reconnects are exhausted,
// and routes channel payloads to per-channel subscribers.
//
// Lifecycle operations (connect, disconnect, timer firings, transport
// callbacks) are serialized by a reentrant lock so a state listener may
// call back into the manager. The lock is never held across an await.

mod state;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use agentboard_api::{
    Channel, Connector, InboundMessage, MessageType, OutboundMessage, SnapshotClient,
    TransportEvent, TungsteniteConnector,
};
use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::RealtimeConfig;
use crate::error::CoreError;
use crate::listener::{ListenerSet, Subscription};
use crate::stream::ValueStream;

pub use state::{
    CONNECTION_FAILED_MESSAGE, ConnectionState, ConnectionStatus, POLLING_FALLBACK_MESSAGE,
};

// ── RealtimeManager ──────────────────────────────────────────────

/// Connection manager for the dashboard's realtime channel.
///
/// Cheaply cloneable via `Arc`. Background tasks hold only weak
/// references, so dropping the last handle tears everything down.
/// [`connect`](Self::connect) must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct RealtimeManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    snapshots: SnapshotClient,
    state: Mutex<ConnectionState>,
    state_tx: watch::Sender<ConnectionState>,
    state_listeners: ListenerSet<ConnectionState>,
    subscribers: ChannelSubscribers,
    session: Mutex<Option<Session>>,
    timers: Mutex<Timers>,
    next_session: AtomicU64,
    /// Bumped by every explicit disconnect.
    epoch: AtomicU64,
    lifecycle: ReentrantMutex<()>,
}

/// One physical connection attempt and, once open, its outbound half.
struct Session {
    id: u64,
    cancel: CancellationToken,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

#[derive(Default)]
struct ChannelSubscribers {
    collaboration: ListenerSet<Value>,
    tasks: ListenerSet<Value>,
    performance: ListenerSet<Value>,
}

impl ChannelSubscribers {
    fn get(&self, channel: Channel) -> &ListenerSet<Value> {
        match channel {
            Channel::Collaboration => &self.collaboration,
            Channel::Tasks => &self.tasks,
            Channel::Performance => &self.performance,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TimerKind {
    Reconnect,
    Heartbeat,
    Polling,
}

/// At most one live timer of each kind.
#[derive(Default)]
struct Timers {
    reconnect: Option<CancellationToken>,
    heartbeat: Option<CancellationToken>,
    polling: Option<CancellationToken>,
}

impl Timers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<CancellationToken> {
        match kind {
            TimerKind::Reconnect => &mut self.reconnect,
            TimerKind::Heartbeat => &mut self.heartbeat,
            TimerKind::Polling => &mut self.polling,
        }
    }

    fn cancel_all(&mut self) {
        for kind in [TimerKind::Reconnect, TimerKind::Heartbeat, TimerKind::Polling] {
            if let Some(token) = self.slot(kind).take() {
                token.cancel();
            }
        }
    }
}

impl RealtimeManager {
    /// Create a manager that speaks WebSocket via `tokio-tungstenite`.
    /// Does NOT connect; call [`connect()`](Self::connect).
    pub fn new(config: RealtimeConfig) -> Result<Self, CoreError> {
        Self::with_connector(config, Arc::new(TungsteniteConnector))
    }

    /// Create a manager over a custom transport.
    pub fn with_connector(
        config: RealtimeConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let snapshots = SnapshotClient::new(config.api_url.clone(), &config.transport())?;
        let (state_tx, _) = watch::channel(ConnectionState::default());

        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                connector,
                snapshots,
                state: Mutex::new(ConnectionState::default()),
                state_tx,
                state_listeners: ListenerSet::new(),
                subscribers: ChannelSubscribers::default(),
                session: Mutex::new(None),
                timers: Mutex::new(Timers::default()),
                next_session: AtomicU64::new(1),
                epoch: AtomicU64::new(0),
                lifecycle: ReentrantMutex::new(()),
            }),
        })
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    /// The HTTP client behind [`fetch_snapshot`](Self::fetch_snapshot).
    pub fn snapshot_client(&self) -> &SnapshotClient {
        &self.inner.snapshots
    }

    // ── State ────────────────────────────────────────────────────

    /// Copy of the current state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().is_connected()
    }

    /// Whether data is currently coming from the polling fallback.
    pub fn is_polling(&self) -> bool {
        self.inner.timers.lock().polling.is_some()
    }

    /// Latest-value subscription to the connection state.
    pub fn watch_state(&self) -> ValueStream<ConnectionState> {
        ValueStream::new(self.inner.state_tx.subscribe())
    }

    /// Run `listener` on every state transition, in order.
    pub fn on_state_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        let id = self.inner.state_listeners.insert(listener);
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.state_listeners.remove(id);
            }
        })
    }

    // ── Channels ─────────────────────────────────────────────────

    /// Run `handler` with the payload of every update on `channel`,
    /// whether it arrived live or from a snapshot fetch.
    pub fn subscribe<F>(&self, channel: Channel, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.inner.subscribers.get(channel).insert(handler);
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.get(channel).remove(id);
            }
        })
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.inner.subscribers.get(channel).len()
    }

    /// Fetch all three snapshots and dispatch each one that arrived.
    ///
    /// Resources are independent: a failure is logged and that channel is
    /// skipped. Returns how many channels were dispatched.
    pub async fn fetch_snapshot(&self) -> usize {
        self.inner.fetch_snapshot().await
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open the realtime channel. No-op while a connection is opening or
    /// open.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Close the channel, cancel every timer, and reset to `Disconnected`.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }
}

impl std::fmt::Debug for RealtimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeManager")
            .field("ws_url", &self.inner.config.ws_url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ── Lifecycle internals ──────────────────────────────────────────

impl ManagerInner {
    fn transition(&self, next: impl FnOnce(&ConnectionState) -> ConnectionState) {
        let snapshot = {
            let mut state = self.state.lock();
            *state = next(&state);
            state.clone()
        };
        debug!(
            status = %snapshot.status,
            attempts = snapshot.reconnect_attempts,
            message = snapshot.error_message.as_deref().unwrap_or(""),
            "connection state changed"
        );
        self.state_tx.send_replace(snapshot.clone());
        self.state_listeners.notify("connection-state", &snapshot);
    }

    fn is_current(&self, session_id: u64) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| s.id == session_id && !s.cancel.is_cancelled())
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Whether a state listener tore down or replaced the session since
    /// `epoch` was read.
    fn superseded(&self, epoch: u64) -> bool {
        self.epoch() != epoch || self.session.lock().is_some()
    }

    fn arm(&self, kind: TimerKind) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.timers.lock().slot(kind).replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    fn disarm(&self, kind: TimerKind) {
        if let Some(token) = self.timers.lock().slot(kind).take() {
            token.cancel();
        }
    }

    fn connect(self: &Arc<Self>) {
        let _lifecycle = self.lifecycle.lock();
        if self.session.lock().is_some() {
            debug!("connect ignored: channel already opening or open");
            return;
        }
        let epoch = self.epoch();
        self.transition(|s| s.connecting(s.reconnect_attempts));
        if self.superseded(epoch) {
            return;
        }
        self.start_session();
    }

    fn start_session(self: &Arc<Self>) {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        *self.session.lock() = Some(Session {
            id,
            cancel: cancel.clone(),
            outbound: None,
        });
        tokio::spawn(run_session(Arc::downgrade(self), id, cancel));
    }

    fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.timers.lock().cancel_all();
        // Dropping the session's sender closes the socket.
        if let Some(session) = self.session.lock().take() {
            session.cancel.cancel();
        }
        self.transition(ConnectionState::reset);
        info!("disconnected");
    }

    // ── Transport callbacks ──────────────────────────────────────

    fn on_open(self: &Arc<Self>, session_id: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        let _lifecycle = self.lifecycle.lock();
        {
            let mut session = self.session.lock();
            match session.as_mut() {
                Some(s) if s.id == session_id && !s.cancel.is_cancelled() => {
                    s.outbound = Some(outbound);
                }
                _ => return false,
            }
        }
        info!(url = %self.config.ws_url, "realtime channel open");
        self.disarm(TimerKind::Reconnect);
        self.transition(|_| ConnectionState::opened(Utc::now()));
        self.start_heartbeat();
        self.stop_polling();
        true
    }

    fn on_connect_failed(self: &Arc<Self>, session_id: u64, reason: &str) {
        let _lifecycle = self.lifecycle.lock();
        if !self.is_current(session_id) {
            return;
        }
        warn!(url = %self.config.ws_url, error = reason, "realtime channel failed to open");
        self.transition(|s| s.failed(CONNECTION_FAILED_MESSAGE));
        self.handle_close(session_id);
    }

    fn on_transport_error(&self, session_id: u64, reason: &str) {
        let _lifecycle = self.lifecycle.lock();
        if !self.is_current(session_id) {
            return;
        }
        // Advisory only; the close that follows drives reconnection.
        warn!(error = reason, "realtime channel error");
        self.transition(|s| s.failed(CONNECTION_FAILED_MESSAGE));
    }

    fn on_close(self: &Arc<Self>, session_id: u64, code: Option<u16>, reason: &str) {
        let _lifecycle = self.lifecycle.lock();
        if !self.is_current(session_id) {
            return;
        }
        info!(?code, reason, "realtime channel closed");
        self.handle_close(session_id);
    }

    fn handle_close(self: &Arc<Self>, session_id: u64) {
        {
            let mut session = self.session.lock();
            if !session.as_ref().is_some_and(|s| s.id == session_id) {
                return;
            }
            session.take();
        }
        self.disarm(TimerKind::Heartbeat);

        let epoch = self.epoch();
        if self.state.lock().is_connected() {
            self.transition(ConnectionState::closed);
        }
        if self.superseded(epoch) {
            debug!("close already handled by a state listener");
            return;
        }
        self.handle_disconnect();
    }

    fn handle_disconnect(self: &Arc<Self>) {
        let attempts = self.state.lock().reconnect_attempts;
        if attempts < self.config.reconnect_max_attempts {
            self.schedule_reconnect(attempts);
        } else if self.config.http_fallback {
            warn!(attempts, "reconnect attempts exhausted, falling back to HTTP polling");
            self.start_polling();
        } else {
            warn!(attempts, "reconnect attempts exhausted; call connect() to retry");
        }
    }

    // ── Timers ───────────────────────────────────────────────────

    fn schedule_reconnect(self: &Arc<Self>, attempts: u32) {
        let delay = self.config.backoff_delay(attempts);
        let token = self.arm(TimerKind::Reconnect);
        info!(
            attempt = attempts.saturating_add(1),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            if let Some(inner) = weak.upgrade() {
                inner.fire_reconnect(&token);
            }
        });
    }

    fn fire_reconnect(self: &Arc<Self>, token: &CancellationToken) {
        let _lifecycle = self.lifecycle.lock();
        if token.is_cancelled() {
            return;
        }
        self.timers.lock().reconnect.take();
        if self.session.lock().is_some() {
            debug!("reconnect skipped: channel already opening or open");
            return;
        }
        let epoch = self.epoch();
        self.transition(|s| s.connecting(s.reconnect_attempts.saturating_add(1)));
        if self.superseded(epoch) {
            return;
        }
        self.start_session();
    }

    fn start_heartbeat(self: &Arc<Self>) {
        let token = self.arm(TimerKind::Heartbeat);
        let period = self.config.heartbeat_interval;
        let weak = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        trace!("sending heartbeat");
                        inner.send_frame(&OutboundMessage::ping_now());
                    }
                }
            }
            debug!("heartbeat stopped");
        });
    }

    fn start_polling(self: &Arc<Self>) {
        let token = self.arm(TimerKind::Polling);
        self.transition(ConnectionState::polling);

        let period = self.config.polling_interval;
        let weak: Weak<Self> = Arc::downgrade(self);
        info!(interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX), "polling started");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        let results = inner.snapshots.fetch_all().await;
                        if token.is_cancelled() {
                            break;
                        }
                        inner.dispatch_snapshots(results);
                    }
                }
            }
            debug!("polling stopped");
        });
    }

    fn stop_polling(&self) {
        if self.timers.lock().polling.is_some() {
            debug!("stopping HTTP polling");
        }
        self.disarm(TimerKind::Polling);
    }

    // ── Messages ─────────────────────────────────────────────────

    fn send_frame(&self, message: &OutboundMessage) {
        let session = self.session.lock();
        let Some(outbound) = session.as_ref().and_then(|s| s.outbound.as_ref()) else {
            trace!("no open channel, frame not sent");
            return;
        };
        if outbound.send(message.encode()).is_err() {
            debug!("channel writer gone, frame not sent");
        }
    }

    fn handle_frame(&self, text: &str) {
        let message = match InboundMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping malformed realtime frame");
                return;
            }
        };

        match message.kind {
            MessageType::Ping => {
                if let Some(channel) = message.channel {
                    warn!(%channel, "ping frame carries a channel; answering as a ping");
                }
                self.send_frame(&OutboundMessage::pong_now());
            }
            MessageType::Pong => trace!(timestamp = %message.timestamp, "pong"),
            MessageType::Error => {
                warn!(data = ?message.data, "backend reported an error");
            }
            MessageType::Update => match message.into_update() {
                Some((channel, data)) => self.dispatch(channel, &data),
                None => debug!("update frame without channel or data ignored"),
            },
        }
    }

    fn dispatch(&self, channel: Channel, data: &Value) {
        let subscribers = self.subscribers.get(channel);
        trace!(%channel, subscribers = subscribers.len(), "dispatching update");
        subscribers.notify(channel.as_ref(), data);
    }

    async fn fetch_snapshot(&self) -> usize {
        let results = self.snapshots.fetch_all().await;
        self.dispatch_snapshots(results)
    }

    fn dispatch_snapshots(
        &self,
        results: [(Channel, Result<Value, agentboard_api::Error>); 3],
    ) -> usize {
        let mut dispatched = 0;
        for (channel, result) in results {
            match result {
                Ok(Value::Null) => debug!(%channel, "snapshot empty"),
                Ok(data) => {
                    self.dispatch(channel, &data);
                    dispatched += 1;
                }
                Err(e) => warn!(%channel, error = %e, "snapshot fetch failed"),
            }
        }
        dispatched
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.timers.get_mut().cancel_all();
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
        }
    }
}

// ── Session task ─────────────────────────────────────────────────

/// Open one connection and pump its events until it closes or the
/// session is cancelled.
async fn run_session(weak: Weak<ManagerInner>, session_id: u64, cancel: CancellationToken) {
    let opening = {
        let Some(inner) = weak.upgrade() else { return };
        inner.connector.connect(&inner.config.ws_url)
    };

    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        result = opening => result,
    };

    let mut inbound = {
        let Some(inner) = weak.upgrade() else { return };
        match result {
            Ok(connection) => {
                let (outbound, inbound) = connection.into_parts();
                if !inner.on_open(session_id, outbound) {
                    return;
                }
                inbound
            }
            Err(e) => {
                inner.on_connect_failed(session_id, &e.to_string());
                return;
            }
        }
    };

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = inbound.recv() => event,
        };
        let Some(inner) = weak.upgrade() else { break };

        match event {
            Some(TransportEvent::Message(text)) => inner.handle_frame(&text),
            Some(TransportEvent::Error(reason)) => inner.on_transport_error(session_id, &reason),
            Some(TransportEvent::Closed { code, reason }) => {
                inner.on_close(session_id, code, &reason);
                break;
            }
            None => {
                inner.on_close(session_id, None, "transport dropped");
                break;
            }
        }
    }
    debug!(session_id, "session task exiting");
}
