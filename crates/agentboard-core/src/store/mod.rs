// ── State/cache store ──
//
// Keyed reactive cells, an independent TTL cache, and the fetch-with-cache
// composition built from both.

mod cache;
mod cached;
mod cell;
mod state_store;

pub use cache::{DEFAULT_TTL, TtlCache};
pub use cached::CachedResource;
pub use cell::StateCell;
pub use state_store::StateStore;
