//! Polling coordinator with typed failure recovery.
//!
//! This crate turns an unreliable remote source into a stream of
//! consistent, classified states for presentation layers (the `vigil`
//! CLI, or anything else that wants last-known-good device state):
//!
//! - **[`PollingCoordinator`]** -- Runs one fetch immediately on
//!   [`start()`](PollingCoordinator::start), then one per interval measured
//!   from the end of the previous cycle. Publishes `Unknown`, `Ready` or
//!   `Unavailable` and never lets a fetch error escape.
//!
//! - **[`FetchCapability`]** -- The only thing the coordinator knows about
//!   the remote side. Implemented by [`PanelFetcher`] for the alarm-panel
//!   service, and by [`fetch_fn`] for ad-hoc closures.
//!
//! - **Failure taxonomy** -- [`FetchError`] kinds map onto
//!   [`FailureClass`]; authentication failures additionally emit a
//!   [`ReauthRequest`].
//!
//! - **Observation** -- synchronous listeners
//!   ([`add_listener`](PollingCoordinator::add_listener)), `watch`
//!   receivers, and [`StateStream`] subscriptions.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod panel;
pub mod state;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CoordinatorConfig, PanelConfig, TlsVerification};
pub use coordinator::{Listener, ListenerId, PollingCoordinator};
pub use error::{CoreError, FetchError};
pub use fetch::{FetchCapability, FetchFn, fetch_fn};
pub use panel::PanelFetcher;
pub use state::{
    CoordinatorState, CycleOutcome, Failure, FailureClass, PollCycle, PollStats, ReauthRequest,
};
pub use stream::{StateStream, StateWatchStream};

// Panel wire types, so consumers need not depend on `vigil-api` directly.
pub use vigil_api::{ArmState, PanelStatus, Sensor, SensorKind};
