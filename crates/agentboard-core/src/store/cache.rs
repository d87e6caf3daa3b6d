// ── TTL cache ──
//
// Time-bounded memoization keyed by string. Entries expire lazily: an
// expired entry is evicted by the first read that notices it.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

/// TTL applied when a write does not name one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    /// `None` when `now + ttl` does not fit in an `Instant`.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// Heterogeneous string-keyed cache with per-entry expiry.
pub struct TtlCache {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `value` under `key` for `ttl` (or the default TTL).
    pub fn set<T: Send + Sync + 'static>(&self, key: &str, value: T, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = Instant::now().checked_add(ttl);
        trace!(key, ttl_ms = ttl.as_millis(), "cache set");
        self.entries.insert(
            key.to_owned(),
            CacheEntry {
                value: Arc::new(value),
                expires_at,
            },
        );
    }

    /// Fetch a live entry. Expired entries are removed and reported absent;
    /// an entry of a different type is reported absent but kept.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        if self.evict_if_expired(key) {
            return None;
        }
        let entry = self.entries.get(key)?;
        let value = entry.value.downcast_ref::<T>().cloned();
        if value.is_none() {
            debug!(key, "cache entry has a different type");
        }
        value
    }

    /// Whether `key` holds an unexpired entry. Evicts it if expired.
    pub fn has_valid(&self, key: &str) -> bool {
        !self.evict_if_expired(key) && self.entries.contains_key(key)
    }

    /// Drop `key`. Returns `true` if it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Entries currently held, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_if_expired(&self, key: &str) -> bool {
        let now = Instant::now();
        let evicted = self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some();
        if evicted {
            debug!(key, "cache entry expired");
        }
        evicted
    }
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entry_lives_until_expiry_then_is_evicted() {
        let cache = TtlCache::new();
        cache.set("k", 7_u32, Some(Duration::from_millis(100)));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cache.get::<u32>("k"), Some(7));
        assert!(cache.has_valid("k"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get::<u32>("k"), None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn has_valid_evicts_expired() {
        let cache = TtlCache::new();
        cache.set("k", "v", None);

        tokio::time::advance(DEFAULT_TTL + Duration::from_millis(1)).await;
        assert!(!cache.has_valid("k"));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rewrite_extends_expiry() {
        let cache = TtlCache::new();
        cache.set("k", 1_i32, Some(Duration::from_secs(1)));
        tokio::time::advance(Duration::from_millis(900)).await;
        cache.set("k", 2_i32, Some(Duration::from_secs(1)));
        tokio::time::advance(Duration::from_millis(900)).await;
        assert_eq!(cache.get::<i32>("k"), Some(2));
    }

    #[test]
    fn wrong_type_reads_as_absent() {
        let cache = TtlCache::new();
        cache.set("k", String::from("text"), None);
        assert_eq!(cache.get::<u64>("k"), None);
        assert_eq!(cache.get::<String>("k").as_deref(), Some("text"));
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = TtlCache::new();
        cache.set("a", 1_u8, None);
        cache.set("b", 2_u8, None);

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn huge_ttl_never_expires() {
        let cache = TtlCache::new();
        cache.set("k", 1_u8, Some(Duration::MAX));
        assert!(cache.has_valid("k"));
    }
}
