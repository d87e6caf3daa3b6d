// ── Reactive value streams ──
//
// Latest-value subscriptions over a `watch` channel: connection state,
// reactive cells, anything that publishes whole snapshots.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A subscription to a single published value.
///
/// Provides both point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting to a `Stream`.
/// Intermediate values may be coalesced; use listener callbacks where
/// every transition matters.
pub struct ValueStream<T: Clone + Send + Sync + 'static> {
    current: T,
    receiver: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> ValueStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<T>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The value captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &T {
        &self.current
    }

    /// The latest value (may have changed since creation).
    pub fn latest(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new value.
    /// Returns `None` once the publisher has been dropped.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        let value = self.receiver.borrow_and_update().clone();
        self.current = value.clone();
        Some(value)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The stream yields the current value first, then every change.
    pub fn into_stream(self) -> ValueWatchStream<T> {
        ValueWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct ValueWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<T>,
}

impl<T: Clone + Send + Sync + 'static> Stream for ValueWatchStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
