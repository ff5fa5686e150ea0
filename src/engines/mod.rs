pub mod cas;
pub mod exclusive;
pub mod lease;
pub mod quorum;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::errors::LockError;

/// A single held Mutex (§4.C–§4.F "Backend Mutex"). Single-use: once
/// released it is dropped, never reacquired. Release is not cancellable and
/// never surfaces an error to the caller — failures are logged only.
#[async_trait]
pub trait HeldMutex: Send {
    /// Best-effort remote release. Implementations must not panic or block
    /// indefinitely; engines that cannot confirm release within their
    /// bounded retry window give up and rely on the backend TTL.
    async fn unlock(self: Box<Self>);
}

/// The algorithmic core for one backend (Component C). Implementations are
/// selected at runtime through the [`crate::registry`] rather than a
/// compile-time generic, so the trait is object-safe and sits behind
/// `Arc<dyn Engine>` everywhere it's used.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Short name used in logs and metrics (`redis`, `etcd`, `jetstream`, `cassandra`).
    fn name(&self) -> &'static str;

    /// One acquisition attempt against the full key (`prefix/key`) with a
    /// fresh per-attempt token, bounded by `timeout`.
    ///
    /// Returns `Ok(None)` when the backend reports the lock held elsewhere
    /// — this is the Open Question 1 / §4.E / §4.F "held elsewhere"
    /// contract, never an error. Returns `Ok(Some(..))` with the held
    /// Mutex and its one-shot expiry signal on success.
    async fn try_acquire(
        &self,
        full_key: &str,
        timeout: Duration,
    ) -> Result<Option<(Box<dyn HeldMutex>, oneshot::Receiver<()>)>, LockError>;

    /// 60s-bounded health probe used by [`crate::session`]'s `Health.Check`.
    async fn healthy(&self) -> bool;
}

pub fn fresh_token() -> String {
    Uuid::new_v4().to_string()
}
