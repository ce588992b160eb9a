// ── Polling coordinator ──
//
// Periodically fetches remote state through a `FetchCapability`,
// classifies failures, and publishes one consistent state per cycle to
// listeners, `watch` subscribers and the reauthorization channel.

mod listeners;
#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use listeners::{Listener, ListenerId};

use crate::config::CoordinatorConfig;
use crate::error::{CoreError, FetchError};
use crate::fetch::FetchCapability;
use crate::state::{
    CoordinatorState, CycleOutcome, Failure, FailureClass, PollCycle, PollStats, ReauthRequest,
};
use crate::stream::StateStream;
use listeners::ListenerRegistry;

const REAUTH_CHANNEL_SIZE: usize = 16;

// ── PollingCoordinator ───────────────────────────────────────────

/// Polls a [`FetchCapability`] on a fixed interval and publishes the
/// result as a [`CoordinatorState`].
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Fetch failures never
/// escape: they become `Unavailable` states, plus a [`ReauthRequest`]
/// when credentials were rejected.
///
/// The runner task holds a reference to the coordinator, so a started
/// coordinator keeps polling until [`stop()`](Self::stop) or
/// [`shutdown()`](Self::shutdown) is called, even if every handle is
/// dropped.
pub struct PollingCoordinator<F: FetchCapability> {
    inner: Arc<CoordinatorInner<F>>,
}

impl<F: FetchCapability> Clone for PollingCoordinator<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CoordinatorInner<F: FetchCapability> {
    config: CoordinatorConfig,
    fetcher: F,
    state: watch::Sender<CoordinatorState<F::Snapshot>>,
    reauth_tx: broadcast::Sender<ReauthRequest>,
    listeners: ListenerRegistry<F::Snapshot>,
    /// Publication gate holding the last assigned sequence number.
    /// `stop()` cancels under this lock, so nothing is published after
    /// it returns.
    publish: Mutex<u64>,
    /// Thread currently holding the publication gate. Lets a listener
    /// call `stop()` without waiting on its own caller.
    publisher: Mutex<Option<ThreadId>>,
    stats: RwLock<PollStats>,
    last_snapshot: RwLock<Option<Arc<F::Snapshot>>>,
    run: Mutex<RunState>,
    /// Held across each fetch. A restarted run or `refresh_now()` waits
    /// here until the fetch of a stopped run has returned.
    in_flight: AsyncMutex<()>,
    /// Parent token; each `start()` runs under a fresh child so the
    /// coordinator can be restarted after `stop()`.
    cancel: CancellationToken,
}

#[derive(Default)]
struct RunState {
    token: Option<CancellationToken>,
    handles: Vec<JoinHandle<()>>,
}

impl<F: FetchCapability> PollingCoordinator<F> {
    /// Create a coordinator. Does NOT fetch -- call [`start()`](Self::start)
    /// to begin polling or [`refresh_now()`](Self::refresh_now) for a single cycle.
    pub fn new(fetcher: F, config: CoordinatorConfig) -> Result<Self, CoreError> {
        config.validate()?;

        let (state, _) = watch::channel(CoordinatorState::Unknown);
        let (reauth_tx, _) = broadcast::channel(REAUTH_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                config,
                fetcher,
                state,
                reauth_tx,
                listeners: ListenerRegistry::new(),
                publish: Mutex::new(0),
                publisher: Mutex::new(None),
                stats: RwLock::new(PollStats::default()),
                last_snapshot: RwLock::new(None),
                run: Mutex::new(RunState::default()),
                in_flight: AsyncMutex::new(()),
                cancel: CancellationToken::new(),
            }),
        })
    }

    /// Access the coordinator configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Access the fetch capability.
    pub fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Begin polling: one immediate cycle, then one cycle every
    /// `poll_interval` after the previous cycle ends.
    ///
    /// Must be called within a tokio runtime. No-op while running.
    pub fn start(&self) {
        let mut run = lock(&self.inner.run);
        if run.token.is_some() {
            debug!("start() ignored: already polling");
            return;
        }

        run.handles.retain(|handle| !handle.is_finished());

        let token = self.inner.cancel.child_token();
        run.token = Some(token.clone());
        run.handles
            .push(tokio::spawn(poll_task(Arc::clone(&self.inner), token)));

        info!(interval = ?self.inner.config.poll_interval, "polling started");
    }

    /// Stop polling.
    ///
    /// Cancels the pending timer. A fetch already in flight runs to
    /// completion but its result is discarded: once this returns, the
    /// coordinator neither mutates state nor notifies anyone for the
    /// stopped run. Called from a listener, the listeners after it are
    /// skipped for the current cycle. Idempotent.
    ///
    /// The next `start()` or `refresh_now()` does not fetch until the
    /// discarded fetch has returned.
    pub fn stop(&self) {
        let Some(token) = lock(&self.inner.run).token.take() else {
            return;
        };

        if self.inner.is_publishing_thread() {
            // Called from a listener: this thread already holds the gate.
            token.cancel();
        } else {
            let _gate = lock(&self.inner.publish);
            token.cancel();
        }

        info!("polling stopped");
    }

    /// Stop polling and wait for the runner task(s) to exit.
    ///
    /// Waits for an in-flight fetch to finish, so a fetch capability
    /// without its own timeout can make this wait indefinitely.
    pub async fn shutdown(&self) {
        self.stop();

        let handles = std::mem::take(&mut lock(&self.inner.run).handles);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "poll task ended abnormally");
            }
        }
        debug!("coordinator shut down");
    }

    /// Whether a runner task is active.
    pub fn is_running(&self) -> bool {
        lock(&self.inner.run).token.is_some()
    }

    /// Run a single cycle now, outside the schedule.
    ///
    /// The cycle is classified, numbered and published like a scheduled
    /// one. Only allowed while stopped. If a stopped run's fetch is still
    /// in flight, waits for it to return first.
    pub async fn refresh_now(&self) -> Result<CoordinatorState<F::Snapshot>, CoreError> {
        if self.is_running() {
            return Err(CoreError::AlreadyRunning);
        }

        let token = self.inner.cancel.child_token();
        self.inner.run_cycle(&token).await;
        Ok(self.state())
    }

    // ── State observation ────────────────────────────────────────

    /// The currently published state.
    pub fn state(&self) -> CoordinatorState<F::Snapshot> {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes (latest value only).
    pub fn watch_state(&self) -> watch::Receiver<CoordinatorState<F::Snapshot>> {
        self.inner.state.subscribe()
    }

    /// Subscribe to state changes as a [`StateStream`].
    pub fn subscribe_state(&self) -> StateStream<F::Snapshot> {
        StateStream::new(self.inner.state.subscribe())
    }

    /// Subscribe to reauthorization requests.
    pub fn subscribe_reauth(&self) -> broadcast::Receiver<ReauthRequest> {
        self.inner.reauth_tx.subscribe()
    }

    /// The most recent successful snapshot, kept while `Unavailable`.
    pub fn last_snapshot(&self) -> Option<Arc<F::Snapshot>> {
        read(&self.inner.last_snapshot).clone()
    }

    pub fn stats(&self) -> PollStats {
        read(&self.inner.stats).clone()
    }

    /// How long ago the last successful cycle finished, or `None` if
    /// no cycle has succeeded yet.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.stats().last_success_at.map(|t| Utc::now() - t)
    }

    // ── Listeners ────────────────────────────────────────────────

    /// Register a callback invoked synchronously for every published
    /// cycle, in sequence order.
    ///
    /// Listeners run on the poll task while the publication gate is
    /// held: keep them short and never block on the coordinator's own
    /// progress from inside one.
    pub fn add_listener(
        &self,
        listener: impl Fn(&CoordinatorState<F::Snapshot>, &PollCycle<F::Snapshot>)
        + Send
        + Sync
        + 'static,
    ) -> ListenerId {
        self.inner.listeners.add(Arc::new(listener))
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

// ── Cycle execution ──────────────────────────────────────────────

impl<F: FetchCapability> CoordinatorInner<F> {
    async fn run_cycle(&self, token: &CancellationToken) {
        let _in_flight = self.in_flight.lock().await;
        if token.is_cancelled() {
            return;
        }

        let started_at = Utc::now();
        let result = self.fetcher.fetch().await;
        let finished_at = Utc::now();
        self.publish(token, started_at, finished_at, result);
    }

    /// Apply one fetch result: number it, transition, notify.
    fn publish(
        &self,
        token: &CancellationToken,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        result: Result<F::Snapshot, FetchError>,
    ) {
        let mut last_sequence = lock(&self.publish);
        if token.is_cancelled() {
            debug!("discarding result of a cycle that finished after stop()");
            return;
        }
        let _publisher = PublisherMark::enter(&self.publisher);

        *last_sequence += 1;
        let sequence = *last_sequence;

        let outcome = match result {
            Ok(snapshot) => CycleOutcome::Success(Arc::new(snapshot)),
            Err(err) => CycleOutcome::Failure(Failure::from(&err)),
        };

        let consecutive_failures = {
            let mut stats = write(&self.stats);
            stats.cycles += 1;
            match &outcome {
                CycleOutcome::Success(_) => {
                    stats.successes += 1;
                    stats.consecutive_failures = 0;
                    stats.last_success_at = Some(finished_at);
                }
                CycleOutcome::Failure(failure) => {
                    stats.failures += 1;
                    stats.consecutive_failures = stats.consecutive_failures.saturating_add(1);
                    stats.last_failure = Some(failure.class);
                }
            }
            stats.consecutive_failures
        };

        if let CycleOutcome::Success(snapshot) = &outcome {
            *write(&self.last_snapshot) = Some(Arc::clone(snapshot));
        }

        let previous = self.state.borrow().clone();
        let next = next_state(
            &previous,
            &outcome,
            consecutive_failures,
            self.config.unavailable_after,
        );

        log_outcome(sequence, &outcome, consecutive_failures);
        if previous.label() != next.label() {
            info!(sequence, from = previous.label(), to = next.label(), "state changed");
        }

        self.state.send_replace(next.clone());

        let cycle = PollCycle {
            sequence,
            started_at,
            finished_at,
            outcome,
        };

        if let CycleOutcome::Failure(failure) = &cycle.outcome {
            if failure.class.needs_reauth() {
                let _ = self.reauth_tx.send(ReauthRequest {
                    sequence,
                    message: failure.message.clone(),
                    at: finished_at,
                });
            }
        }

        self.listeners.notify(&next, &cycle, token);
    }

    fn is_publishing_thread(&self) -> bool {
        *lock(&self.publisher) == Some(thread::current().id())
    }
}

/// Compute the state that follows `current` after a cycle.
///
/// Success always yields `Ready`. Authentication failures always yield
/// `Unavailable`. Other failures keep a `Ready` state until
/// `consecutive_failures` reaches `unavailable_after`; from `Unknown` or
/// `Unavailable` they yield `Unavailable` immediately.
pub(crate) fn next_state<S>(
    current: &CoordinatorState<S>,
    outcome: &CycleOutcome<S>,
    consecutive_failures: u32,
    unavailable_after: u32,
) -> CoordinatorState<S> {
    match outcome {
        CycleOutcome::Success(snapshot) => CoordinatorState::Ready(Arc::clone(snapshot)),
        CycleOutcome::Failure(failure) => {
            let tolerated = failure.class != FailureClass::Authentication
                && consecutive_failures < unavailable_after;
            match current {
                CoordinatorState::Ready(snapshot) if tolerated => {
                    CoordinatorState::Ready(Arc::clone(snapshot))
                }
                _ => CoordinatorState::Unavailable(failure.clone()),
            }
        }
    }
}

fn log_outcome<S>(sequence: u64, outcome: &CycleOutcome<S>, consecutive_failures: u32) {
    match outcome {
        CycleOutcome::Success(_) => debug!(sequence, "poll succeeded"),
        CycleOutcome::Failure(failure) => match failure.class {
            FailureClass::Authentication => error!(
                sequence,
                error = %failure.message,
                "authentication rejected; reauthorization required"
            ),
            FailureClass::Unknown => error!(
                sequence,
                error = %failure.message,
                consecutive_failures,
                "poll failed with an unclassified error"
            ),
            FailureClass::Transient | FailureClass::Timeout => warn!(
                sequence,
                class = %failure.class,
                error = %failure.message,
                consecutive_failures,
                "poll failed"
            ),
        },
    }
}

// ── Background task ──────────────────────────────────────────────

/// Run cycles until cancelled. The next sleep starts only after the
/// current cycle resolved, so cycles never overlap.
async fn poll_task<F: FetchCapability>(inner: Arc<CoordinatorInner<F>>, cancel: CancellationToken) {
    let interval = inner.config.poll_interval;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        inner.run_cycle(&cancel).await;

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    debug!("poll task exited");
}

// ── Helpers ──────────────────────────────────────────────────────

/// Marks the current thread as the publisher for the guard's lifetime.
struct PublisherMark<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> PublisherMark<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *lock(slot) = Some(thread::current().id());
        Self(slot)
    }
}

impl Drop for PublisherMark<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}

// A panicking listener must not wedge stop() or later cycles.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(rw: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(rw: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}
