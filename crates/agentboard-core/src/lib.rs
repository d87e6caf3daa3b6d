// agentboard-core: Realtime data layer between agentboard-api and consumers (CLI/UI).

pub mod bridge;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod model;
pub mod realtime;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::RealtimeConfig;
pub use context::DashboardContext;
pub use dispatcher::EventDispatcher;
pub use error::CoreError;
pub use listener::{ListenerId, Subscription};
pub use realtime::{ConnectionState, ConnectionStatus, RealtimeManager};
pub use store::{CachedResource, StateCell, StateStore, TtlCache};
pub use stream::ValueStream;

// Wire-level types consumers need alongside the manager.
pub use agentboard_api::{Channel, Connector, TransportEvent, WsConnection};

pub use model::{CollaborationFlow, PerformanceSnapshot, Task, TaskStatus, TaskSummary};
