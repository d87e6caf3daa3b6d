// ── Reactive state cell ──
//
// A named value holder with synchronous get/set and two ways to observe
// changes: per-write callbacks (every write, in order) and a `watch`
// subscription (latest value, may coalesce).

use std::sync::Arc;

use tokio::sync::watch;

use crate::listener::{ListenerSet, Subscription};
use crate::stream::ValueStream;

/// A live handle to one keyed value. Cheaply cloneable; clones share the
/// value and its subscribers.
pub struct StateCell<T: Clone + Send + Sync + 'static> {
    inner: Arc<CellInner<T>>,
}

struct CellInner<T> {
    key: String,
    value: watch::Sender<T>,
    listeners: ListenerSet<T>,
}

impl<T: Clone + Send + Sync + 'static> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> StateCell<T> {
    pub fn new(key: impl Into<String>, initial: T) -> Self {
        let (value, _) = watch::channel(initial);
        Self {
            inner: Arc::new(CellInner {
                key: key.into(),
                value,
                listeners: ListenerSet::new(),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Current value (cloned).
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning it.
    ///
    /// Do not call `set`/`update` on the same cell from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value and notify subscribers.
    ///
    /// Every write notifies, even when the new value equals the old one.
    pub fn set(&self, value: T) {
        self.inner.value.send_replace(value);
        self.notify();
    }

    /// Mutate the value in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.inner.value.send_modify(f);
        self.notify();
    }

    /// Run `f` after every write, with the new value.
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.listeners.insert(f);
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.remove(id);
            }
        })
    }

    /// Latest-value subscription.
    pub fn watch(&self) -> ValueStream<T> {
        ValueStream::new(self.inner.value.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Whether two handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        if self.inner.listeners.is_empty() {
            return;
        }
        // Clone out so no watch borrow is held while callbacks run.
        let current = self.get();
        self.inner.listeners.notify(&self.inner.key, &current);
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCell")
            .field("key", &self.inner.key)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}
