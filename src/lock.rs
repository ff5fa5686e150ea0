use std::sync::Arc;

use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::engines::{Engine, HeldMutex};
use crate::errors::LockError;
use crate::options::{LockOptions, RETRY_JITTER};
use crate::scheduler::LockScheduler;
use crate::utils::{rng_seed_now, sleep};

/// Wraps an [`Engine`] with the scheduler and retry policy (Component D).
/// Holds at most one live Mutex at a time; a fresh one is created for every
/// acquire attempt and discarded on release.
pub struct BackendLock {
    full_key: String,
    engine: Arc<dyn Engine>,
    scheduler: LockScheduler,
    options: LockOptions,
    held: AsyncMutex<Option<Box<dyn HeldMutex>>>,
}

impl BackendLock {
    pub fn new(full_key: String, engine: Arc<dyn Engine>, options: LockOptions) -> Self {
        BackendLock {
            full_key,
            engine,
            scheduler: LockScheduler::new(),
            options,
            held: AsyncMutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.full_key
    }

    /// Blocking acquire: retries `try_acquire` at `options.retry_interval`
    /// (jittered) until it succeeds or `cancel` fires. Each attempt uses a
    /// fresh Mutex, never the one from a prior failed attempt.
    pub async fn lock(&self, cancel: CancellationToken) -> Result<oneshot::Receiver<()>, LockError> {
        self.scheduler
            .schedule(|| async {
                let mut rng = rng_seed_now();
                loop {
                    if cancel.is_cancelled() {
                        return Err(LockError::Cancelled);
                    }

                    match self
                        .engine
                        .try_acquire(&self.full_key, self.options.acquire_timeout)
                        .await
                    {
                        Ok(Some((mutex, expired))) => {
                            *self.held.lock().await = Some(mutex);
                            return Ok(expired);
                        }
                        Ok(None) | Err(_) if self.options.retry_interval.is_some() => {
                            let interval = self.options.retry_interval.unwrap();
                            tokio::select! {
                                _ = cancel.cancelled() => return Err(LockError::Cancelled),
                                _ = sleep(interval, RETRY_JITTER, Some(&mut rng)) => {}
                            }
                        }
                        Ok(None) => {
                            return Err(LockError::Taken {
                                key: self.full_key.clone(),
                            });
                        }
                        Err(e) => return Err(e),
                    }
                }
            })
            .await
    }

    /// Non-blocking acquire: a single attempt. `Ok(None)` means the lock is
    /// held elsewhere — never an error.
    pub async fn try_lock(&self) -> Result<Option<oneshot::Receiver<()>>, LockError> {
        self.scheduler
            .schedule(|| async {
                match self
                    .engine
                    .try_acquire(&self.full_key, self.options.acquire_timeout)
                    .await
                {
                    Ok(Some((mutex, expired))) => {
                        *self.held.lock().await = Some(mutex);
                        Ok(Some(expired))
                    }
                    Ok(None) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
    }

    /// Releases the held Mutex and frees the scheduler. Returns immediately;
    /// the remote release runs in the background and its errors are logged,
    /// never surfaced (Atomicity B).
    pub async fn unlock(&self) -> Result<(), LockError> {
        self.scheduler
            .done(|| async {
                let mutex = self
                    .held
                    .lock()
                    .await
                    .take()
                    .expect("unlock called without a held Mutex");

                let backend = self.engine.name();
                let key = self.full_key.clone();
                tokio::spawn(async move {
                    mutex.unlock().await;
                    let _ = (backend, key);
                });
                Ok(())
            })
            .await
    }
}
