// ── Process-wide keyed state ──
//
// Reactive cells addressed by string key plus an independent TTL cache.
// One `StateStore` is shared (behind an `Arc`) by everything in a
// `DashboardContext`.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::warn;

use super::cache::TtlCache;
use super::cached::CachedResource;
use super::cell::StateCell;

type AnyCell = Arc<dyn Any + Send + Sync>;

/// Keyed reactive cells and a TTL cache.
///
/// Cells are created lazily on first access and live as long as the
/// store. A key is bound to one value type; writing a different type
/// replaces the cell (and detaches its old subscribers).
#[derive(Default)]
pub struct StateStore {
    cells: DashMap<String, AnyCell>,
    cache: TtlCache,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose cache uses `ttl` when a write does not name one.
    pub fn with_cache_ttl(ttl: Duration) -> Self {
        Self {
            cells: DashMap::new(),
            cache: TtlCache::with_default_ttl(ttl),
        }
    }

    // ── Reactive cells ───────────────────────────────────────────────

    /// Existing cell for `key`, if it holds a `T`.
    pub fn cell<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<StateCell<T>> {
        self.cells
            .get(key)
            .and_then(|cell| cell.downcast_ref::<StateCell<T>>().cloned())
    }

    /// Live handle to the cell for `key`, creating it with `default` if
    /// absent. An existing cell keeps its value; `default` is ignored.
    pub fn use_store<T: Clone + Send + Sync + 'static>(&self, key: &str, default: T) -> StateCell<T> {
        match self.cells.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if let Some(cell) = occupied.get().downcast_ref::<StateCell<T>>() {
                    return cell.clone();
                }
                warn!(key, "state key rebound to a different type, replacing cell");
                let cell = StateCell::new(key, default);
                occupied.insert(Arc::new(cell.clone()));
                cell
            }
            Entry::Vacant(vacant) => {
                let cell = StateCell::new(key, default);
                vacant.insert(Arc::new(cell.clone()));
                cell
            }
        }
    }

    /// Current value of `key`, if a cell of type `T` exists.
    pub fn get_state<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        self.cell::<T>(key).map(|cell| cell.get())
    }

    /// Write `key`, creating the cell if needed.
    pub fn set_state<T: Clone + Send + Sync + 'static>(&self, key: &str, value: T) {
        // The map guard is released before the cell notifies anyone.
        if let Some(cell) = self.cell::<T>(key) {
            cell.set(value);
            return;
        }
        let cell = self.use_store(key, value.clone());
        cell.set(value);
    }

    /// Apply several writes in order.
    pub fn batch_update<K, T, I>(&self, updates: I)
    where
        K: AsRef<str>,
        T: Clone + Send + Sync + 'static,
        I: IntoIterator<Item = (K, T)>,
    {
        for (key, value) in updates {
            self.set_state(key.as_ref(), value);
        }
    }

    pub fn has_state(&self, key: &str) -> bool {
        self.cells.contains_key(key)
    }

    /// Keys of every cell created so far.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.cells.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    // ── Cache ────────────────────────────────────────────────────────

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    pub fn get_cache<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        self.cache.get(key)
    }

    pub fn set_cache<T: Send + Sync + 'static>(&self, key: &str, value: T, ttl: Option<Duration>) {
        self.cache.set(key, value, ttl);
    }

    pub fn has_valid_cache(&self, key: &str) -> bool {
        self.cache.has_valid(key)
    }

    pub fn invalidate_cache(&self, key: &str) -> bool {
        self.cache.invalidate(key)
    }

    /// Fetch-with-cache handle for `key`. See [`CachedResource`].
    pub fn cached<T: Clone + Send + Sync + 'static>(
        self: &Arc<Self>,
        key: &str,
        ttl: Option<Duration>,
    ) -> CachedResource<T> {
        CachedResource::new(Arc::clone(self), key, ttl)
    }

    // ── Reset ────────────────────────────────────────────────────────

    /// Drop every cell and cache entry. Existing handles keep working but
    /// are detached from the store.
    pub fn clear_all(&self) {
        self.cells.clear();
        self.cache.clear();
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("cells", &self.cells.len())
            .field("cache", &self.cache)
            .finish()
    }
}
