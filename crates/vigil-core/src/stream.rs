// ── Reactive state streams ──
//
// Subscription type for consuming coordinator state changes from other
// tasks without registering a callback.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::state::CoordinatorState;

/// A subscription to a coordinator's published state.
///
/// Provides point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`. Being
/// backed by a `watch` channel, a slow reader only ever sees the most
/// recent state; use a listener when every cycle matters.
pub struct StateStream<S: Clone + Send + Sync + 'static> {
    current: CoordinatorState<S>,
    receiver: watch::Receiver<CoordinatorState<S>>,
}

impl<S: Clone + Send + Sync + 'static> StateStream<S> {
    pub(crate) fn new(receiver: watch::Receiver<CoordinatorState<S>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The state captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &CoordinatorState<S> {
        &self.current
    }

    /// The latest published state.
    pub fn latest(&self) -> CoordinatorState<S> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new state.
    /// Returns `None` once the coordinator has been dropped.
    pub async fn changed(&mut self) -> Option<CoordinatorState<S>> {
        self.receiver.changed().await.ok()?;
        let state = self.receiver.borrow_and_update().clone();
        self.current = state.clone();
        Some(state)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The stream yields the current state first, then every change.
    pub fn into_stream(self) -> StateWatchStream<S> {
        StateWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct StateWatchStream<S: Clone + Send + Sync + 'static> {
    inner: WatchStream<CoordinatorState<S>>,
}

impl<S: Clone + Send + Sync + 'static> Stream for StateWatchStream<S> {
    type Item = CoordinatorState<S>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream is Unpin, so re-pinning the field is fine.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
