// ── Channel → store adapters ──
//
// Decode channel payloads into typed models and publish them as reactive
// cells, so UI consumers read state instead of subscribing to raw JSON.

use std::sync::Arc;

use agentboard_api::Channel;
use serde::de::DeserializeOwned;
use tracing::{trace, warn};

use crate::listener::Subscription;
use crate::model::{CollaborationFlow, PerformanceSnapshot, TaskSummary};
use crate::realtime::{ConnectionState, RealtimeManager};
use crate::store::StateStore;

/// Cell holding `Option<CollaborationFlow>`.
pub const COLLABORATION_KEY: &str = "collaboration";
/// Cell holding `Option<TaskSummary>`.
pub const TASKS_KEY: &str = "tasks";
/// Cell holding `Option<PerformanceSnapshot>`.
pub const PERFORMANCE_KEY: &str = "performance";
/// Cell holding the latest `ConnectionState`.
pub const CONNECTION_KEY: &str = "connection";

/// Decode every `channel` payload as `T` into the `Option<T>` cell `key`.
///
/// Payloads that do not decode are logged and leave the cell untouched.
pub fn bind_channel<T>(
    manager: &RealtimeManager,
    store: &Arc<StateStore>,
    channel: Channel,
    key: &str,
) -> Subscription
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let cell = store.use_store::<Option<T>>(key, None);
    manager.subscribe(channel, move |data| match T::deserialize(data) {
        Ok(value) => {
            trace!(%channel, key = cell.key(), "channel payload stored");
            cell.set(Some(value));
        }
        Err(e) => warn!(%channel, error = %e, "channel payload does not match its model, ignored"),
    })
}

/// Mirror connection state transitions into the `connection` cell.
pub fn bind_connection_state(manager: &RealtimeManager, store: &Arc<StateStore>) -> Subscription {
    let cell = store.use_store(CONNECTION_KEY, manager.state());
    manager.on_state_change(move |state: &ConnectionState| cell.set(state.clone()))
}

/// Bind all three channels and the connection state with their standard
/// keys.
pub fn bind_dashboard(manager: &RealtimeManager, store: &Arc<StateStore>) -> Vec<Subscription> {
    vec![
        bind_channel::<CollaborationFlow>(manager, store, Channel::Collaboration, COLLABORATION_KEY),
        bind_channel::<TaskSummary>(manager, store, Channel::Tasks, TASKS_KEY),
        bind_channel::<PerformanceSnapshot>(manager, store, Channel::Performance, PERFORMANCE_KEY),
        bind_connection_state(manager, store),
    ]
}
