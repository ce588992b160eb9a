// ── Consumer callbacks ──
//
// Ordered registry of synchronous listeners. Notification iterates over
// a copy of the registered callbacks so a listener may register or
// remove listeners (including itself) while being called.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::state::{CoordinatorState, PollCycle};

/// Callback invoked once per published cycle.
pub type Listener<S> = Arc<dyn Fn(&CoordinatorState<S>, &PollCycle<S>) + Send + Sync>;

/// Handle returned by [`add_listener`](crate::PollingCoordinator::add_listener).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) struct ListenerRegistry<S> {
    next_id: AtomicU64,
    entries: RwLock<IndexMap<ListenerId, Listener<S>>>,
}

impl<S> ListenerRegistry<S> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(IndexMap::new()),
        }
    }

    pub(crate) fn add(&self, listener: Listener<S>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .expect("listener lock poisoned")
            .insert(id, listener);
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        self.entries
            .write()
            .expect("listener lock poisoned")
            .shift_remove(&id)
            .is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().expect("listener lock poisoned").len()
    }

    /// Call every listener in registration order, stopping early once
    /// `run` is cancelled.
    pub(crate) fn notify(
        &self,
        state: &CoordinatorState<S>,
        cycle: &PollCycle<S>,
        run: &CancellationToken,
    ) {
        let listeners: Vec<Listener<S>> = self
            .entries
            .read()
            .expect("listener lock poisoned")
            .values()
            .cloned()
            .collect();

        for listener in listeners {
            if run.is_cancelled() {
                break;
            }
            listener(state, cycle);
        }
    }
}
