#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;

use super::{PollingCoordinator, next_state};
use crate::config::CoordinatorConfig;
use crate::error::{CoreError, FetchError};
use crate::fetch::FetchCapability;
use crate::state::{CoordinatorState, CycleOutcome, Failure, FailureClass, PollCycle};

#[derive(Debug, Clone, PartialEq)]
struct Reading(u32);

/// Returns scripted outcomes in order, then `Unknown` errors forever.
#[derive(Default)]
struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<Reading, FetchError>>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: Mutex<Vec<Instant>>,
    delay: Duration,
    gate: Option<Arc<Notify>>,
}

impl ScriptedFetcher {
    fn new(script: impl IntoIterator<Item = Result<Reading, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of `fetch()` calls observed running at once.
    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn started(&self) -> Vec<Instant> {
        self.started.lock().unwrap().clone()
    }
}

impl FetchCapability for ScriptedFetcher {
    type Snapshot = Reading;

    async fn fetch(&self) -> Result<Reading, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.started.lock().unwrap().push(Instant::now());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(FetchError::unknown("script exhausted")))
    }
}

type Observed = (CoordinatorState<Reading>, PollCycle<Reading>);

fn coordinator(
    fetcher: ScriptedFetcher,
    config: CoordinatorConfig,
) -> (PollingCoordinator<ScriptedFetcher>, mpsc::UnboundedReceiver<Observed>) {
    let coordinator = PollingCoordinator::new(fetcher, config).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    coordinator.add_listener(move |state, cycle| {
        let _ = tx.send((state.clone(), cycle.clone()));
    });
    (coordinator, rx)
}

async fn collect(rx: &mut mpsc::UnboundedReceiver<Observed>, n: usize) -> Vec<Observed> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(rx.recv().await.unwrap());
    }
    out
}

fn config() -> CoordinatorConfig {
    CoordinatorConfig::with_interval(Duration::from_secs(60))
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn zero_interval_is_rejected() {
    let config = CoordinatorConfig {
        poll_interval: Duration::ZERO,
        ..CoordinatorConfig::default()
    };
    let result = PollingCoordinator::new(ScriptedFetcher::default(), config);
    assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
}

#[tokio::test(start_paused = true)]
async fn starts_unknown_and_does_not_fetch_until_started() {
    let (coordinator, _rx) = coordinator(ScriptedFetcher::new([Ok(Reading(1))]), config());

    tokio::time::sleep(Duration::from_secs(600)).await;

    assert!(coordinator.state().is_unknown());
    assert_eq!(coordinator.fetcher().calls(), 0);
    assert!(!coordinator.is_running());
}

// ── Cycle classification ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn six_cycle_scenario_publishes_expected_states() {
    let script = [
        Err(FetchError::connection("connection refused")),
        Err(FetchError::connection("connection reset")),
        Err(FetchError::timeout("timed out")),
        Err(FetchError::unknown("unexpected payload")),
        Ok(Reading(42)),
        Err(FetchError::authentication("token revoked")),
    ];
    let (coordinator, mut rx) = coordinator(ScriptedFetcher::new(script), config());
    let mut reauth = coordinator.subscribe_reauth();

    coordinator.start();
    let observed = collect(&mut rx, 6).await;
    coordinator.shutdown().await;

    let labels: Vec<_> = observed.iter().map(|(state, _)| state.label()).collect();
    assert_eq!(
        labels,
        [
            "unavailable",
            "unavailable",
            "unavailable",
            "unavailable",
            "ready",
            "unavailable"
        ]
    );

    let classes: Vec<_> = observed
        .iter()
        .map(|(state, _)| state.failure().map(|f| f.class))
        .collect();
    assert_eq!(
        classes,
        [
            Some(FailureClass::Transient),
            Some(FailureClass::Transient),
            Some(FailureClass::Timeout),
            Some(FailureClass::Unknown),
            None,
            Some(FailureClass::Authentication),
        ]
    );

    let request = reauth.try_recv().unwrap();
    assert_eq!(request.sequence, 6);
    assert_eq!(request.message, "token revoked");
    assert!(reauth.try_recv().is_err(), "exactly one reauth request");

    assert!(observed[5].1.needs_reauth());
    assert!(!observed[3].1.needs_reauth());
}

#[tokio::test(start_paused = true)]
async fn each_authentication_failure_requests_reauth_once() {
    let script = [
        Ok(Reading(1)),
        Err(FetchError::authentication("token revoked")),
        Err(FetchError::authentication("token still revoked")),
    ];
    let (coordinator, mut rx) = coordinator(ScriptedFetcher::new(script), config());
    let mut reauth = coordinator.subscribe_reauth();

    coordinator.start();
    let observed = collect(&mut rx, 3).await;
    coordinator.shutdown().await;

    let labels: Vec<_> = observed.iter().map(|(state, _)| state.label()).collect();
    assert_eq!(labels, ["ready", "unavailable", "unavailable"]);

    let first = reauth.try_recv().unwrap();
    let second = reauth.try_recv().unwrap();
    assert_eq!((first.sequence, second.sequence), (2, 3));
    assert_eq!(second.message, "token still revoked");
    assert!(reauth.try_recv().is_err(), "one request per failure");
}

#[tokio::test(start_paused = true)]
async fn sequences_are_gapless_and_increasing() {
    let (coordinator, mut rx) = coordinator(
        ScriptedFetcher::new([Ok(Reading(1)), Err(FetchError::timeout("slow"))]),
        config(),
    );

    coordinator.start();
    let observed = collect(&mut rx, 5).await;
    coordinator.shutdown().await;

    let sequences: Vec<u64> = observed.iter().map(|(_, cycle)| cycle.sequence).collect();
    assert_eq!(sequences, [1, 2, 3, 4, 5]);
    for (_, cycle) in &observed {
        assert!(cycle.finished_at >= cycle.started_at);
    }
}

#[tokio::test(start_paused = true)]
async fn snapshot_is_published_unchanged() {
    let (coordinator, mut rx) = coordinator(
        ScriptedFetcher::new([Ok(Reading(42)), Err(FetchError::connection("down"))]),
        config(),
    );

    coordinator.start();
    let observed = collect(&mut rx, 2).await;
    coordinator.shutdown().await;

    let (state, cycle) = &observed[0];
    let CycleOutcome::Success(from_cycle) = &cycle.outcome else {
        panic!("first cycle should succeed");
    };
    let from_state = state.snapshot().unwrap();
    assert!(Arc::ptr_eq(from_state, from_cycle));
    assert_eq!(**from_state, Reading(42));

    // Kept as last-known-good while unavailable.
    assert!(coordinator.state().is_unavailable());
    assert_eq!(*coordinator.last_snapshot().unwrap(), Reading(42));
}

#[tokio::test(start_paused = true)]
async fn stats_track_outcomes() {
    let (coordinator, mut rx) = coordinator(
        ScriptedFetcher::new([
            Err(FetchError::connection("down")),
            Ok(Reading(1)),
            Err(FetchError::timeout("slow")),
            Err(FetchError::timeout("slow")),
        ]),
        config(),
    );

    assert!(coordinator.data_age().is_none());
    coordinator.start();
    collect(&mut rx, 4).await;
    coordinator.shutdown().await;

    let stats = coordinator.stats();
    assert_eq!(stats.cycles, 4);
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.failures, 3);
    assert_eq!(stats.consecutive_failures, 2);
    assert_eq!(stats.last_failure, Some(FailureClass::Timeout));
    assert!(stats.last_success_at.is_some());
    assert!(coordinator.data_age().is_some());
}

// ── Threshold policy ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn threshold_tolerates_failures_while_ready() {
    let config = CoordinatorConfig {
        unavailable_after: 3,
        ..config()
    };
    let (coordinator, mut rx) = coordinator(
        ScriptedFetcher::new([
            Ok(Reading(1)),
            Err(FetchError::connection("down")),
            Err(FetchError::timeout("slow")),
            Err(FetchError::connection("down")),
            Ok(Reading(2)),
            Err(FetchError::connection("down")),
            Err(FetchError::authentication("revoked")),
        ]),
        config,
    );

    coordinator.start();
    let observed = collect(&mut rx, 7).await;
    coordinator.shutdown().await;

    let summary: Vec<_> = observed
        .iter()
        .map(|(state, _)| (state.label(), state.snapshot().map(|s| s.0)))
        .collect();
    assert_eq!(
        summary,
        [
            ("ready", Some(1)),
            ("ready", Some(1)),
            ("ready", Some(1)),
            ("unavailable", None),
            ("ready", Some(2)),
            ("ready", Some(2)),
            ("unavailable", None),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn first_failure_leaves_unknown_regardless_of_threshold() {
    let config = CoordinatorConfig {
        unavailable_after: 3,
        ..config()
    };
    let (coordinator, mut rx) =
        coordinator(ScriptedFetcher::new([Err(FetchError::connection("down"))]), config);

    coordinator.start();
    let observed = collect(&mut rx, 1).await;
    coordinator.shutdown().await;

    assert!(observed[0].0.is_unavailable());
}

#[test]
fn next_state_ignores_threshold_for_authentication() {
    let ready = CoordinatorState::Ready(Arc::new(Reading(1)));
    let auth = CycleOutcome::Failure(Failure {
        class: FailureClass::Authentication,
        message: "revoked".into(),
    });
    let transient = CycleOutcome::Failure(Failure {
        class: FailureClass::Transient,
        message: "down".into(),
    });

    assert!(next_state(&ready, &auth, 1, 5).is_unavailable());
    assert!(next_state(&ready, &transient, 1, 5).is_ready());
    assert!(next_state(&ready, &transient, 5, 5).is_unavailable());
    assert!(next_state(&CoordinatorState::Unknown, &transient, 1, 5).is_unavailable());
}

// ── Scheduling ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn next_cycle_starts_one_interval_after_previous_ended() {
    let fetcher = ScriptedFetcher::new([Ok(Reading(1)), Ok(Reading(2)), Ok(Reading(3))])
        .with_delay(Duration::from_secs(10));
    let (coordinator, mut rx) = coordinator(fetcher, config());

    let began = Instant::now();
    coordinator.start();
    collect(&mut rx, 3).await;
    coordinator.shutdown().await;

    let started = coordinator.fetcher().started();
    assert_eq!(started[0] - began, Duration::ZERO);
    assert_eq!(started[1] - started[0], Duration::from_secs(70));
    assert_eq!(started[2] - started[1], Duration::from_secs(70));
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent() {
    let (coordinator, mut rx) = coordinator(ScriptedFetcher::new([Ok(Reading(1))]), config());

    coordinator.start();
    coordinator.start();
    collect(&mut rx, 1).await;

    assert!(coordinator.is_running());
    assert_eq!(coordinator.fetcher().calls(), 1);

    coordinator.stop();
    coordinator.stop();
    assert!(!coordinator.is_running());
    coordinator.shutdown().await;
}

// ── Stop semantics ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stop_discards_in_flight_result() {
    let gate = Arc::new(Notify::new());
    let fetcher = ScriptedFetcher::new([Ok(Reading(1))]).with_gate(Arc::clone(&gate));
    let (coordinator, mut rx) = coordinator(fetcher, config());

    coordinator.start();
    while coordinator.fetcher().calls() == 0 {
        tokio::task::yield_now().await;
    }

    coordinator.stop();
    gate.notify_one();
    coordinator.shutdown().await;

    assert!(coordinator.state().is_unknown());
    assert_eq!(coordinator.stats().cycles, 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn stop_from_listener_does_not_deadlock() {
    let coordinator =
        PollingCoordinator::new(ScriptedFetcher::new([Ok(Reading(1))]), config()).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = coordinator.clone();
    coordinator.add_listener(move |_, cycle| {
        if cycle.sequence == 2 {
            handle.stop();
        }
        let _ = tx.send(cycle.sequence);
    });

    coordinator.start();
    assert_eq!(rx.recv().await, Some(1));
    assert_eq!(rx.recv().await, Some(2));
    coordinator.shutdown().await;

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(!coordinator.is_running());
    assert!(rx.try_recv().is_err());
    assert_eq!(coordinator.fetcher().calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_from_listener_skips_later_listeners() {
    let coordinator =
        PollingCoordinator::new(ScriptedFetcher::new([Ok(Reading(1))]), config()).unwrap();
    let handle = coordinator.clone();
    coordinator.add_listener(move |_, _| handle.stop());
    let late = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&late);
    coordinator.add_listener(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    coordinator.start();
    while coordinator.stats().cycles == 0 {
        tokio::task::yield_now().await;
    }
    coordinator.shutdown().await;

    assert!(coordinator.state().is_ready());
    assert_eq!(late.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn restart_waits_for_discarded_fetch() {
    let gate = Arc::new(Notify::new());
    let fetcher =
        ScriptedFetcher::new([Ok(Reading(1)), Ok(Reading(2))]).with_gate(Arc::clone(&gate));
    let (coordinator, mut rx) = coordinator(fetcher, config());

    coordinator.start();
    while coordinator.fetcher().calls() == 0 {
        tokio::task::yield_now().await;
    }
    coordinator.stop();
    coordinator.start();
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(coordinator.fetcher().calls(), 1);

    gate.notify_one();
    while coordinator.fetcher().calls() < 2 {
        tokio::task::yield_now().await;
    }
    gate.notify_one();
    let observed = collect(&mut rx, 1).await;
    coordinator.shutdown().await;

    assert_eq!(coordinator.fetcher().max_in_flight(), 1);
    assert_eq!(observed[0].1.sequence, 1);
    assert_eq!(observed[0].0.snapshot().map(|s| s.0), Some(2));
}

#[tokio::test(start_paused = true)]
async fn refresh_after_stop_waits_for_discarded_fetch() {
    let gate = Arc::new(Notify::new());
    let fetcher =
        ScriptedFetcher::new([Ok(Reading(1)), Ok(Reading(2))]).with_gate(Arc::clone(&gate));
    let (coordinator, _rx) = coordinator(fetcher, config());

    coordinator.start();
    while coordinator.fetcher().calls() == 0 {
        tokio::task::yield_now().await;
    }
    coordinator.stop();

    let refresh = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.refresh_now().await }
    });
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(coordinator.fetcher().calls(), 1);

    gate.notify_one();
    while coordinator.fetcher().calls() < 2 {
        tokio::task::yield_now().await;
    }
    gate.notify_one();
    let state = refresh.await.unwrap().unwrap();
    coordinator.shutdown().await;

    assert_eq!(coordinator.fetcher().max_in_flight(), 1);
    assert_eq!(state.snapshot().map(|s| s.0), Some(2));
    assert_eq!(coordinator.stats().cycles, 1);
}

#[tokio::test(start_paused = true)]
async fn restart_after_stop_continues_sequence() {
    let (coordinator, mut rx) = coordinator(
        ScriptedFetcher::new([Ok(Reading(1)), Ok(Reading(2))]),
        config(),
    );

    coordinator.start();
    collect(&mut rx, 1).await;
    coordinator.shutdown().await;

    coordinator.start();
    let observed = collect(&mut rx, 1).await;
    coordinator.shutdown().await;

    assert_eq!(observed[0].1.sequence, 2);
    assert_eq!(observed[0].0.snapshot().map(|s| s.0), Some(2));
}

// ── Listeners & streams ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn removed_listener_is_not_called() {
    let (coordinator, mut rx) = coordinator(ScriptedFetcher::new([Ok(Reading(1))]), config());
    let extra = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&extra);
    let id = coordinator.add_listener(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(coordinator.listener_count(), 2);
    assert!(coordinator.remove_listener(id));
    assert!(!coordinator.remove_listener(id));

    coordinator.start();
    collect(&mut rx, 1).await;
    coordinator.shutdown().await;

    assert_eq!(extra.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn state_stream_reports_changes() {
    let (coordinator, _rx) = coordinator(ScriptedFetcher::new([Ok(Reading(5))]), config());
    let mut stream = coordinator.subscribe_state();
    assert!(stream.current().is_unknown());

    coordinator.start();
    let state = stream.changed().await.unwrap();
    coordinator.shutdown().await;

    assert_eq!(state.snapshot().map(|s| s.0), Some(5));
    assert!(stream.current().is_ready());
}

#[tokio::test(start_paused = true)]
async fn into_stream_yields_current_then_changes() {
    use futures_util::StreamExt;

    let (coordinator, _rx) = coordinator(ScriptedFetcher::new([Ok(Reading(9))]), config());
    let mut stream = coordinator.subscribe_state().into_stream();
    assert!(stream.next().await.unwrap().is_unknown());

    coordinator.start();
    let next = stream.next().await.unwrap();
    coordinator.shutdown().await;

    assert_eq!(next.snapshot().map(|s| s.0), Some(9));
}

// ── refresh_now ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn refresh_now_runs_a_single_cycle() {
    let (coordinator, mut rx) = coordinator(ScriptedFetcher::new([Ok(Reading(7))]), config());

    let state = coordinator.refresh_now().await.unwrap();

    assert_eq!(state.snapshot().map(|s| s.0), Some(7));
    assert_eq!(coordinator.stats().cycles, 1);
    assert_eq!(rx.try_recv().unwrap().1.sequence, 1);
    assert!(!coordinator.is_running());
}

#[tokio::test(start_paused = true)]
async fn refresh_now_is_rejected_while_running() {
    let (coordinator, _rx) = coordinator(ScriptedFetcher::new([Ok(Reading(1))]), config());

    coordinator.start();
    let result = coordinator.refresh_now().await;
    coordinator.shutdown().await;

    assert!(matches!(result, Err(CoreError::AlreadyRunning)));
}
