use std::future::Future;

use thiserror::Error;
use tokio::sync::{Mutex, Notify};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("nothing scheduled on this handle")]
    NothingScheduled,
}

/// Serializes `Lock`/`Unlock` transitions on a single [`crate::lock::BackendLock`]
/// handle. `schedule`/`done` strictly alternate: at most one holder is ever
/// active on a given handle, which prevents a second acquire from silently
/// replacing a live Mutex (and leaking its keepalive task).
#[derive(Default)]
pub struct LockScheduler {
    scheduled: Mutex<bool>,
    notify: Notify,
}

impl LockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks while another acquisition is in progress on this handle, then
    /// runs `f`. If `f` succeeds the handle is marked scheduled; if `f`
    /// fails the handle is left unscheduled so a later attempt may proceed.
    ///
    /// The `scheduled` guard is held across `f().await`: wait + run + flag
    /// set is one critical section, so two concurrent `schedule()` calls
    /// can never both observe `!scheduled` and both run `f`.
    pub async fn schedule<T, E, Fut>(&self, f: impl FnOnce() -> Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        loop {
            let mut scheduled = self.scheduled.lock().await;
            if !*scheduled {
                let result = f().await;
                if result.is_ok() {
                    *scheduled = true;
                }
                return result;
            }
            drop(scheduled);
            self.notify.notified().await;
        }
    }

    /// Runs `f` and clears the scheduled flag, waking one waiter. Fails with
    /// [`SchedulerError::NothingScheduled`] if `schedule` never succeeded.
    pub async fn done<T, E, Fut>(&self, f: impl FnOnce() -> Fut) -> Result<T, E>
    where
        E: From<SchedulerError>,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let scheduled = self.scheduled.lock().await;
            if !*scheduled {
                return Err(SchedulerError::NothingScheduled.into());
            }
        }

        let result = f().await;
        *self.scheduled.lock().await = false;
        self.notify.notify_one();
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn schedule_commits_only_on_success() {
        let s = LockScheduler::new();
        let err: Result<(), SchedulerError> =
            s.schedule(|| async { Err(SchedulerError::NothingScheduled) }).await;
        assert!(err.is_err());
        // The failing schedule left the handle unscheduled, so a fresh
        // schedule succeeds immediately rather than blocking.
        let ok: Result<(), SchedulerError> = s.schedule(|| async { Ok(()) }).await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn done_without_schedule_fails() {
        let s = LockScheduler::new();
        let result: Result<(), SchedulerError> = s.done(|| async { Ok(()) }).await;
        assert_eq!(result, Err(SchedulerError::NothingScheduled));
    }

    #[tokio::test]
    async fn second_schedule_blocks_until_done() {
        let s = Arc::new(LockScheduler::new());
        let _: Result<(), SchedulerError> = s.schedule(|| async { Ok(()) }).await;

        let s2 = Arc::clone(&s);
        let handle = tokio::spawn(async move {
            let _: Result<(), SchedulerError> = s2.schedule(|| async { Ok(()) }).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        let _: Result<(), SchedulerError> = s.done(|| async { Ok(()) }).await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_schedule_calls_never_overlap_f() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let s = Arc::new(LockScheduler::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let s = Arc::clone(&s);
            let concurrent = Arc::clone(&concurrent);
            let max_concurrent = Arc::clone(&max_concurrent);
            handles.push(tokio::spawn(async move {
                let result: Result<(), SchedulerError> = s
                    .schedule(|| async {
                        let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                        max_concurrent.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        concurrent.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await;
                result.unwrap();
                s.done(|| async { Ok(()) }).await.unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1, "f() must never run concurrently on one handle");
    }
}
