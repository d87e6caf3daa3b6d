// ── Dashboard context ──
//
// The explicitly constructed bundle a dashboard front end works against:
// one connection manager, one state store, one event dispatcher. Pass it
// (or clones of its parts) to consumers instead of reaching for globals.
//
// While bound, channel payloads and connection state changes are also
// queued on the event bus under the channel's name and `connection`, for
// consumers that render in batches on their own schedule.

use std::sync::Arc;

use agentboard_api::{Channel, Connector};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{info, warn};

use crate::bridge::{self, COLLABORATION_KEY, PERFORMANCE_KEY, TASKS_KEY};
use crate::config::RealtimeConfig;
use crate::dispatcher::EventDispatcher;
use crate::error::CoreError;
use crate::listener::Subscription;
use crate::model::{CollaborationFlow, PerformanceSnapshot, TaskSummary};
use crate::realtime::{ConnectionState, RealtimeManager};
use crate::store::StateStore;

/// Bus event carrying each serialized `ConnectionState` transition.
pub const CONNECTION_EVENT: &str = "connection";

/// Connection manager, state store, and event bus for one dashboard.
pub struct DashboardContext {
    realtime: RealtimeManager,
    store: Arc<StateStore>,
    events: EventDispatcher,
    bindings: Mutex<Vec<Subscription>>,
}

impl DashboardContext {
    pub fn new(config: RealtimeConfig) -> Result<Self, CoreError> {
        Ok(Self::from_manager(RealtimeManager::new(config)?))
    }

    pub fn with_connector(
        config: RealtimeConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, CoreError> {
        Ok(Self::from_manager(RealtimeManager::with_connector(
            config, connector,
        )?))
    }

    fn from_manager(realtime: RealtimeManager) -> Self {
        Self {
            realtime,
            store: Arc::new(StateStore::new()),
            events: EventDispatcher::new(),
            bindings: Mutex::new(Vec::new()),
        }
    }

    pub fn realtime(&self) -> &RealtimeManager {
        &self.realtime
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Attach the store adapters and the bus feed. Idempotent.
    pub fn bind(&self) {
        let mut bindings = self.bindings.lock();
        if !bindings.is_empty() {
            return;
        }
        *bindings = bridge::bind_dashboard(&self.realtime, &self.store);
        bindings.extend(self.feed_events());
    }

    /// Bind, load the initial snapshot, and open the realtime channel.
    /// Returns how many snapshot resources arrived.
    ///
    /// Calling `start` again re-fetches and reconnects without binding
    /// twice.
    pub async fn start(&self) -> usize {
        self.bind();
        let loaded = self.realtime.fetch_snapshot().await;
        info!(resources = loaded, "initial snapshot loaded");
        self.realtime.connect();
        loaded
    }

    /// Bind and open the realtime channel without a snapshot fetch.
    pub fn connect(&self) {
        self.bind();
        self.realtime.connect();
    }

    /// Disconnect and detach the adapters, then flush the bus so queued
    /// events, including the final transition, reach their listeners.
    /// Stored state is kept.
    pub fn shutdown(&self) {
        self.realtime.disconnect();
        for binding in self.bindings.lock().drain(..) {
            binding.unsubscribe();
        }
        self.events.flush();
    }

    /// Queue channel payloads and state transitions on the bus. Events
    /// with no listener at the time are not queued.
    fn feed_events(&self) -> Vec<Subscription> {
        let mut feeds: Vec<Subscription> = Channel::ALL
            .into_iter()
            .map(|channel| {
                let events = self.events.clone();
                self.realtime.subscribe(channel, move |data: &Value| {
                    if events.listener_count(channel.as_ref()) > 0 {
                        events.enqueue(channel.as_ref(), data.clone());
                    }
                })
            })
            .collect();

        let events = self.events.clone();
        feeds.push(self.realtime.on_state_change(move |state: &ConnectionState| {
            if events.listener_count(CONNECTION_EVENT) == 0 {
                return;
            }
            match serde_json::to_value(state) {
                Ok(payload) => events.enqueue(CONNECTION_EVENT, payload),
                Err(e) => warn!(error = %e, "connection state not serializable"),
            }
        }));
        feeds
    }

    // ── Typed state ──────────────────────────────────────────────

    pub fn collaboration(&self) -> Option<CollaborationFlow> {
        self.store
            .get_state::<Option<CollaborationFlow>>(COLLABORATION_KEY)
            .flatten()
    }

    pub fn tasks(&self) -> Option<TaskSummary> {
        self.store.get_state::<Option<TaskSummary>>(TASKS_KEY).flatten()
    }

    pub fn performance(&self) -> Option<PerformanceSnapshot> {
        self.store
            .get_state::<Option<PerformanceSnapshot>>(PERFORMANCE_KEY)
            .flatten()
    }

    pub fn connection(&self) -> ConnectionState {
        self.realtime.state()
    }
}

impl std::fmt::Debug for DashboardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardContext")
            .field("realtime", &self.realtime)
            .field("store", &self.store)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
