// ── Fetch capability ──
//
// The only thing the coordinator knows about the remote side. Vendor
// clients, sessions and credentials stay behind this trait.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::FetchError;

/// An opaque source of remote snapshots.
///
/// Implementations perform one fetch per call and never retry
/// internally; the coordinator schedules retries by polling again.
pub trait FetchCapability: Send + Sync + 'static {
    /// Payload of a successful fetch. Passed through to consumers unchanged.
    type Snapshot: Clone + fmt::Debug + Send + Sync + 'static;

    fn fetch(&self) -> impl Future<Output = Result<Self::Snapshot, FetchError>> + Send;
}

impl<F: FetchCapability> FetchCapability for Arc<F> {
    type Snapshot = F::Snapshot;

    fn fetch(&self) -> impl Future<Output = Result<Self::Snapshot, FetchError>> + Send {
        F::fetch(self)
    }
}

/// Adapter that turns an async closure into a [`FetchCapability`].
pub struct FetchFn<F>(F);

/// Wrap `f` so each poll calls it once.
pub fn fetch_fn<F, Fut, S>(f: F) -> FetchFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S, FetchError>> + Send,
    S: Clone + fmt::Debug + Send + Sync + 'static,
{
    FetchFn(f)
}

impl<F, Fut, S> FetchCapability for FetchFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S, FetchError>> + Send,
    S: Clone + fmt::Debug + Send + Sync + 'static,
{
    type Snapshot = S;

    fn fetch(&self) -> impl Future<Output = Result<S, FetchError>> + Send {
        (self.0)()
    }
}
