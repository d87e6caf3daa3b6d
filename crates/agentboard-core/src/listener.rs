// ── Fault-isolated listener sets ──
//
// The shared fan-out primitive behind the event dispatcher, the connection
// manager's state and channel subscribers, and reactive state cells.
// Callbacks are invoked on a snapshot of the set, so a callback may
// register or remove listeners (including itself) while being notified.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::error;

/// Identifier handed out on registration; used for removal.
pub type ListenerId = u64;

/// A registered callback.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// An ordered set of callbacks receiving `&T`.
pub struct ListenerSet<T: ?Sized> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Listener<T>)>>,
}

impl<T: ?Sized> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> ListenerSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback and return its id.
    pub fn insert<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, Arc::new(listener)));
        id
    }

    /// Register a callback built from its own id, so it can refer to
    /// (and remove) itself.
    pub fn insert_with<F>(&self, make: impl FnOnce(ListenerId) -> F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener<T> = Arc::new(make(id));
        self.entries.lock().push((id, listener));
        id
    }

    /// Remove a callback. Returns `false` if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.lock().iter().any(|(existing, _)| *existing == id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Copy of the current registrations. The lock is released before
    /// any callback runs.
    pub fn snapshot(&self) -> Vec<(ListenerId, Listener<T>)> {
        self.entries.lock().clone()
    }

    /// Invoke every registered callback with `value`.
    ///
    /// A callback removed by an earlier sibling during the same call is
    /// skipped. A panicking callback is logged and skipped; the rest still
    /// run. Returns how many callbacks panicked.
    pub fn notify(&self, label: &str, value: &T) -> usize {
        self.snapshot()
            .into_iter()
            .filter(|(id, listener)| {
                self.contains(*id) && !invoke_isolated(label, || listener(value))
            })
            .count()
    }
}

impl<T: ?Sized> std::fmt::Debug for ListenerSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Run `f`, catching and logging a panic. Returns `true` if `f` completed.
pub fn invoke_isolated(label: &str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            error!(listener = label, panic = %panic_message(payload.as_ref()), "listener panicked");
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Handle returned by every `on`/`subscribe` style registration.
///
/// Dropping the handle does NOT unsubscribe; call [`unsubscribe`](Self::unsubscribe).
/// Unsubscribing more than once is a no-op.
pub struct Subscription {
    cancel: Box<dyn Fn() + Send + Sync>,
    done: AtomicBool,
}

impl Subscription {
    pub fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
            done: AtomicBool::new(false),
        }
    }

    /// Remove the registration.
    pub fn unsubscribe(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            (self.cancel)();
        }
    }

    pub fn is_active(&self) -> bool {
        !self.done.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
