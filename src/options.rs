use std::time::Duration;

use crate::globals::RETRY_INTERVAL;

/// Jitter applied to [`LockOptions::retry_interval`]; each retry sleeps for
/// `retry_interval * (1 + U(-RETRY_JITTER, RETRY_JITTER))`.
pub const RETRY_JITTER: f64 = 0.10;

/// Timeouts and retry policy shared by every backend lock.
#[derive(Clone)]
pub struct LockOptions {
    /// Interval between retry attempts in blocking `Lock`; `None` disables
    /// retry entirely, which is how `TryLock` is implemented in terms of
    /// the same acquire loop.
    pub retry_interval: Option<Duration>,
    /// Per-attempt timeout passed to the engine's acquire call.
    pub acquire_timeout: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        LockOptions {
            retry_interval: Some(RETRY_INTERVAL),
            acquire_timeout: crate::globals::DEFAULT_LOCK_EXPIRY,
        }
    }
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }
}
