// ── Coordinator state model ──
//
// The published state, the per-cycle record handed to consumers, and
// the failure taxonomy. Snapshots are held behind `Arc` and passed
// through untouched.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::error::FetchError;

// ── FailureClass ─────────────────────────────────────────────────

/// Classification of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureClass {
    /// Connection-level problem; retried on the next cycle.
    Transient,
    /// Credentials rejected; consumers should prompt for new ones.
    Authentication,
    /// The remote side did not answer in time; retried on the next cycle.
    Timeout,
    /// Unclassified vendor error; handled like `Transient`.
    Unknown,
}

impl FailureClass {
    pub fn needs_reauth(self) -> bool {
        matches!(self, Self::Authentication)
    }
}

/// A classified fetch failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub class: FailureClass,
    pub message: String,
}

impl From<&FetchError> for Failure {
    fn from(err: &FetchError) -> Self {
        Self {
            class: err.class(),
            message: err.message().to_owned(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

// ── CoordinatorState ─────────────────────────────────────────────

/// State published by a [`PollingCoordinator`](crate::PollingCoordinator).
///
/// `Unknown` only until the first cycle completes; the coordinator never
/// returns to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum CoordinatorState<S> {
    Unknown,
    Ready(Arc<S>),
    Unavailable(Failure),
}

impl<S> CoordinatorState<S> {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// The snapshot, if the state is `Ready`.
    pub fn snapshot(&self) -> Option<&Arc<S>> {
        match self {
            Self::Ready(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// The last error, if the state is `Unavailable`.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Unavailable(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Ready(_) => "ready",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

// ── PollCycle ────────────────────────────────────────────────────

/// Result of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "data", rename_all = "snake_case")]
pub enum CycleOutcome<S> {
    Success(Arc<S>),
    Failure(Failure),
}

impl<S> CycleOutcome<S> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure.class),
        }
    }
}

/// One published execution of the fetch.
///
/// Sequence numbers start at 1 and increase by exactly one per
/// published cycle. Cycles discarded after `stop()` do not consume a
/// number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollCycle<S> {
    pub sequence: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: CycleOutcome<S>,
}

impl<S> PollCycle<S> {
    pub fn needs_reauth(&self) -> bool {
        self.outcome
            .failure_class()
            .is_some_and(FailureClass::needs_reauth)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

// ── Reauthorization ──────────────────────────────────────────────

/// Emitted once per cycle that failed with [`FailureClass::Authentication`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReauthRequest {
    pub sequence: u64,
    pub message: String,
    pub at: DateTime<Utc>,
}

// ── PollStats ────────────────────────────────────────────────────

/// Running counters maintained by the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub cycles: u64,
    pub successes: u64,
    pub failures: u64,
    /// Failed cycles since the last success.
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure: Option<FailureClass>,
}
