// ── Fetch-with-cache ──
//
// Composes the TTL cache with three reactive cells (data, loading, error)
// so a consumer can render an async resource without re-fetching it on
// every access.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::cell::StateCell;
use super::state_store::StateStore;

/// An async resource memoized in a [`StateStore`].
///
/// For a key `k` the resource uses cache key `cache:k` and the cells
/// `cache:k` (data), `cache:k:loading` and `cache:k:error`, so any two
/// handles for the same key share state.
pub struct CachedResource<T: Clone + Send + Sync + 'static> {
    store: Arc<StateStore>,
    cache_key: String,
    ttl: Option<Duration>,
    data: StateCell<Option<T>>,
    loading: StateCell<bool>,
    error: StateCell<Option<String>>,
}

impl<T: Clone + Send + Sync + 'static> CachedResource<T> {
    pub fn new(store: Arc<StateStore>, key: &str, ttl: Option<Duration>) -> Self {
        let cache_key = format!("cache:{key}");
        let data = store.use_store(&cache_key, None);
        let loading = store.use_store(&format!("{cache_key}:loading"), false);
        let error = store.use_store(&format!("{cache_key}:error"), None);
        Self {
            store,
            cache_key,
            ttl,
            data,
            loading,
            error,
        }
    }

    pub fn data(&self) -> &StateCell<Option<T>> {
        &self.data
    }

    pub fn loading(&self) -> &StateCell<bool> {
        &self.loading
    }

    pub fn error(&self) -> &StateCell<Option<String>> {
        &self.error
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Resolve the resource.
    ///
    /// A valid cache entry fills the data cell without calling `producer`.
    /// Otherwise `producer` runs with `loading` set and `error` cleared; its
    /// result lands in the data cell and the cache, or its error in the
    /// error cell. `loading` is cleared however the call ends, including
    /// when the returned future is dropped. Errors never escape: the
    /// return value is the data, if any.
    pub async fn fetch<F, Fut, E>(&self, producer: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if let Some(hit) = self.store.get_cache::<T>(&self.cache_key) {
            debug!(key = %self.cache_key, "cache hit");
            self.data.set(Some(hit.clone()));
            return Some(hit);
        }

        self.loading.set(true);
        self.error.set(None);
        let _loading = LoadingGuard(&self.loading);

        match producer().await {
            Ok(value) => {
                self.data.set(Some(value.clone()));
                self.store
                    .set_cache(&self.cache_key, value.clone(), self.ttl);
                Some(value)
            }
            Err(e) => {
                warn!(key = %self.cache_key, error = %e, "cached fetch failed");
                self.error.set(Some(e.to_string()));
                None
            }
        }
    }

    /// Drop the cached value and empty the data cell, so the next
    /// [`fetch`](Self::fetch) calls its producer.
    pub fn invalidate(&self) {
        self.store.invalidate_cache(&self.cache_key);
        self.data.set(None);
    }
}

struct LoadingGuard<'a>(&'a StateCell<bool>);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    fn counting_producer(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> std::future::Ready<Result<u32, String>> + use<> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(value))
        }
    }

    #[tokio::test]
    async fn second_fetch_hits_cache() {
        let store = Arc::new(StateStore::new());
        let res: CachedResource<u32> = store.cached("tasks", None);
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(res.fetch(counting_producer(&calls, 1)).await, Some(1));
        assert_eq!(res.fetch(counting_producer(&calls, 2)).await, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(res.data().get(), Some(1));
    }

    #[tokio::test]
    async fn invalidate_forces_one_producer_call() {
        let store = Arc::new(StateStore::new());
        let res: CachedResource<u32> = store.cached("tasks", None);
        let calls = Arc::new(AtomicUsize::new(0));

        res.fetch(counting_producer(&calls, 1)).await;
        res.invalidate();
        assert_eq!(res.data().get(), None);

        assert_eq!(res.fetch(counting_producer(&calls, 2)).await, Some(2));
        assert_eq!(res.fetch(counting_producer(&calls, 3)).await, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_lands_in_error_cell_and_clears_loading() {
        let store = Arc::new(StateStore::new());
        let res: CachedResource<u32> = store.cached("perf", None);

        let loading_seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&loading_seen);
        res.loading().subscribe(move |v: &bool| sink.lock().push(*v));

        let out = res
            .fetch(|| async { Err::<u32, _>("backend down") })
            .await;

        assert_eq!(out, None);
        assert_eq!(res.error().get().as_deref(), Some("backend down"));
        assert!(!res.loading().get());
        assert_eq!(*loading_seen.lock(), vec![true, false]);
        assert!(!store.has_valid_cache("cache:perf"));
    }

    #[tokio::test]
    async fn success_clears_previous_error() {
        let store = Arc::new(StateStore::new());
        let res: CachedResource<u32> = store.cached("perf", None);

        res.fetch(|| async { Err::<u32, _>("first try") }).await;
        res.fetch(|| async { Ok::<_, String>(5) }).await;

        assert_eq!(res.error().get(), None);
        assert_eq!(res.data().get(), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_refetches() {
        let store = Arc::new(StateStore::new());
        let res: CachedResource<u32> = store.cached("tasks", Some(Duration::from_millis(50)));
        let calls = Arc::new(AtomicUsize::new(0));

        res.fetch(counting_producer(&calls, 1)).await;
        tokio::time::advance(Duration::from_millis(51)).await;
        assert_eq!(res.fetch(counting_producer(&calls, 2)).await, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn handles_for_same_key_share_cells() {
        let store = Arc::new(StateStore::new());
        let a: CachedResource<u32> = store.cached("k", None);
        let b: CachedResource<u32> = store.cached("k", None);

        a.fetch(|| async { Ok::<_, String>(8) }).await;
        assert_eq!(b.data().get(), Some(8));
        assert_eq!(store.get_state::<Option<u32>>("cache:k"), Some(Some(8)));
    }
}
