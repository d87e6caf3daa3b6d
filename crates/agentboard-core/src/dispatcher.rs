//! Generic named-event pub/sub with a bounded replay queue.
//!
//! Handlers registered with [`EventDispatcher::on`] run synchronously on
//! [`emit`](EventDispatcher::emit), each isolated from the others. Events
//! can instead be [`enqueue`](EventDispatcher::enqueue)d while immediate
//! dispatch is unwanted and replayed later with
//! [`flush`](EventDispatcher::flush).
//!
//! ```rust,ignore
//! let events: EventDispatcher = EventDispatcher::new();
//! let sub = events.on("task:done", |payload| println!("{payload}"));
//!
//! events.enqueue("task:done", json!({ "id": "run-1" }));
//! events.flush();
//! sub.unsubscribe();
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::listener::{ListenerId, ListenerSet, Subscription};

/// Maximum number of queued events; older entries are dropped first.
pub const MAX_QUEUE_LEN: usize = 100;

/// Named-event dispatcher. Cheaply cloneable; clones share listeners and
/// queue.
pub struct EventDispatcher<P = serde_json::Value> {
    inner: Arc<DispatcherInner<P>>,
}

struct DispatcherInner<P> {
    listeners: DashMap<String, Arc<ListenerSet<P>>>,
    queue: Mutex<VecDeque<(String, P)>>,
    flushing: AtomicBool,
}

impl<P> Clone for EventDispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> Default for EventDispatcher<P> {
    fn default() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                listeners: DashMap::new(),
                queue: Mutex::new(VecDeque::new()),
                flushing: AtomicBool::new(false),
            }),
        }
    }
}

impl<P> DispatcherInner<P> {
    fn remove(&self, event: &str, id: ListenerId) -> bool {
        let removed = self
            .listeners
            .get(event)
            .is_some_and(|set| set.remove(id));
        self.listeners.remove_if(event, |_, set| set.is_empty());
        removed
    }
}

impl<P: Send + 'static> EventDispatcher<P> {
    pub fn new() -> Self {
        Self::default()
    }

    fn listener_set(&self, event: &str) -> Arc<ListenerSet<P>> {
        // Clone the Arc out so no map guard is held while callbacks run.
        Arc::clone(self.inner.listeners.entry(event.to_owned()).or_default().value())
    }

    fn subscription(&self, event: &str, id: ListenerId) -> Subscription {
        let weak: Weak<DispatcherInner<P>> = Arc::downgrade(&self.inner);
        let event = event.to_owned();
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(&event, id);
            }
        })
    }

    /// Register `handler` for `event` and return its id for [`off`](Self::off).
    pub fn add_listener<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.listener_set(event).insert(handler)
    }

    /// Register `handler` for `event`.
    pub fn on<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = self.add_listener(event, handler);
        self.subscription(event, id)
    }

    /// Register `handler` to run on the next `event` only.
    ///
    /// The handler fires at most once even if `event` is emitted again
    /// (or reentrantly) before the registration is removed.
    pub fn once<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: FnOnce(&P) + Send + 'static,
    {
        let slot = Mutex::new(Some(handler));
        let weak = Arc::downgrade(&self.inner);
        let name = event.to_owned();

        let id = self.listener_set(event).insert_with(move |id| {
            move |payload: &P| {
                let taken = slot.lock().take();
                if let Some(inner) = weak.upgrade() {
                    inner.remove(&name, id);
                }
                if let Some(handler) = taken {
                    handler(payload);
                }
            }
        });
        self.subscription(event, id)
    }

    /// Remove one handler. No-op if it is not registered.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.inner.remove(event, id)
    }

    /// Synchronously invoke every handler registered for `event`.
    ///
    /// A panicking handler is logged and does not affect the others or
    /// the caller.
    pub fn emit(&self, event: &str, payload: &P) {
        let Some(set) = self
            .inner
            .listeners
            .get(event)
            .map(|set| Arc::clone(set.value()))
        else {
            debug!(event, "no listeners for event");
            return;
        };
        set.notify(event, payload);
    }

    /// Buffer an event for a later [`flush`](Self::flush).
    ///
    /// Once [`MAX_QUEUE_LEN`] events are waiting the oldest one is dropped.
    pub fn enqueue(&self, event: &str, payload: P) {
        let mut queue = self.inner.queue.lock();
        if queue.len() >= MAX_QUEUE_LEN {
            if let Some((dropped, _)) = queue.pop_front() {
                warn!(event = %dropped, limit = MAX_QUEUE_LEN, "event queue full, dropping oldest");
            }
        }
        queue.push_back((event.to_owned(), payload));
    }

    /// Emit every queued event in enqueue order.
    ///
    /// A `flush` issued from inside a handler while a flush is running is
    /// a no-op; events enqueued during the flush wait for the next one.
    pub fn flush(&self) {
        if self.inner.flushing.swap(true, Ordering::AcqRel) {
            debug!("flush already in progress");
            return;
        }
        let _guard = FlushGuard(&self.inner.flushing);

        let pending: Vec<_> = self.inner.queue.lock().drain(..).collect();
        for (event, payload) in &pending {
            self.emit(event, payload);
        }
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Drop queued events without emitting them.
    pub fn clear_queue(&self) {
        self.inner.queue.lock().clear();
    }

    /// Remove every handler and queued event.
    pub fn clear_all(&self) {
        self.inner.listeners.clear();
        self.clear_queue();
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.listeners.get(event).map_or(0, |set| set.len())
    }
}

impl<P> std::fmt::Debug for EventDispatcher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("events", &self.inner.listeners.len())
            .field("queued", &self.inner.queue.lock().len())
            .finish()
    }
}

/// Clears the in-flight flag even if a flush unwinds.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize};

    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, impl Fn(&Value) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: &Value| sink.lock().push(v.clone()))
    }

    #[test]
    fn emit_reaches_every_handler() {
        let events: EventDispatcher = EventDispatcher::new();
        let (a, fa) = recorder();
        let (b, fb) = recorder();
        events.on("tick", fa);
        events.on("tick", fb);

        events.emit("tick", &json!(1));
        assert_eq!(*a.lock(), vec![json!(1)]);
        assert_eq!(*b.lock(), vec![json!(1)]);
    }

    #[test]
    fn emit_without_listeners_is_noop() {
        let events: EventDispatcher = EventDispatcher::new();
        events.emit("nobody", &json!(null));
        assert_eq!(events.listener_count("nobody"), 0);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let events: EventDispatcher = EventDispatcher::new();
        let (seen, f) = recorder();
        let sub = events.on("tick", f);

        sub.unsubscribe();
        sub.unsubscribe();
        events.emit("tick", &json!(1));
        assert!(seen.lock().is_empty());
        assert_eq!(events.listener_count("tick"), 0);
    }

    #[test]
    fn off_removes_specific_handler() {
        let events: EventDispatcher = EventDispatcher::new();
        let (a, fa) = recorder();
        let (b, fb) = recorder();
        let id = events.add_listener("tick", fa);
        events.on("tick", fb);

        assert!(events.off("tick", id));
        assert!(!events.off("tick", id));
        events.emit("tick", &json!(2));
        assert!(a.lock().is_empty());
        assert_eq!(*b.lock(), vec![json!(2)]);
    }

    #[test]
    fn handler_removed_mid_emit_does_not_fire() {
        let events: EventDispatcher = EventDispatcher::new();
        let victim = Arc::new(AtomicU64::new(0));
        let (v, remover) = (Arc::clone(&victim), events.clone());
        events.on("tick", move |_| {
            remover.off("tick", v.load(Ordering::SeqCst));
        });
        let (b, fb) = recorder();
        victim.store(events.add_listener("tick", fb), Ordering::SeqCst);

        events.emit("tick", &json!(1));
        assert!(b.lock().is_empty());
        assert_eq!(events.listener_count("tick"), 1);
    }

    #[test]
    fn once_fires_exactly_once() {
        let events: EventDispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        events.once("ready", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        events.emit("ready", &json!(null));
        events.emit("ready", &json!(null));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(events.listener_count("ready"), 0);
    }

    #[test]
    fn once_survives_reentrant_emit() {
        let events: EventDispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let inner = events.clone();
        events.once("ready", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            inner.emit("ready", &json!("again"));
        });

        events.emit("ready", &json!(null));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_is_isolated() {
        let events: EventDispatcher = EventDispatcher::new();
        let (seen, f) = recorder();
        events.on("tick", |_| panic!("handler failure"));
        events.on("tick", f);

        events.emit("tick", &json!("ok"));
        assert_eq!(*seen.lock(), vec![json!("ok")]);
    }

    #[test]
    fn queue_keeps_most_recent_in_order() {
        let events: EventDispatcher = EventDispatcher::new();
        let (seen, f) = recorder();
        events.on("n", f);

        for i in 0..150 {
            events.enqueue("n", json!(i));
        }
        assert_eq!(events.queue_len(), MAX_QUEUE_LEN);

        events.flush();
        let expected: Vec<Value> = (50..150).map(|i| json!(i)).collect();
        assert_eq!(*seen.lock(), expected);
        assert_eq!(events.queue_len(), 0);
    }

    #[test]
    fn nested_flush_is_noop() {
        let events: EventDispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let (c, inner) = (Arc::clone(&count), events.clone());
        events.on("n", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            inner.enqueue("n", json!("from handler"));
            inner.flush();
        });

        events.enqueue("n", json!(1));
        events.flush();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(events.queue_len(), 1);

        events.flush();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_queue_discards_without_emitting() {
        let events: EventDispatcher = EventDispatcher::new();
        let (seen, f) = recorder();
        events.on("n", f);
        events.enqueue("n", json!(1));

        events.clear_queue();
        events.flush();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn clear_all_resets_everything() {
        let events: EventDispatcher = EventDispatcher::new();
        let (seen, f) = recorder();
        events.on("n", f);
        events.enqueue("n", json!(1));

        events.clear_all();
        events.flush();
        events.emit("n", &json!(2));
        assert!(seen.lock().is_empty());
        assert_eq!(events.listener_count("n"), 0);
    }
}
