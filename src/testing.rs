//! Backend-agnostic conformance harness: a fake in-memory [`Engine`] that
//! lets the universal properties of §8 be exercised against the scheduler,
//! [`crate::lock::BackendLock`], and retry machinery without a live
//! etcd/NATS/Cassandra/Redis cluster.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::time::Instant;

use crate::engines::{fresh_token, Engine, HeldMutex};
use crate::errors::LockError;

struct Entry {
    token: String,
    until: Instant,
}

/// A single-process stand-in for a quorum/session/consumer/CAS backend: one
/// `HashMap` slot per key, keyed by token, expiring after `validity`. Can be
/// told to simulate a network partition so Liveness B can be exercised.
#[derive(Clone)]
pub struct FakeEngine {
    state: Arc<AsyncMutex<HashMap<String, Entry>>>,
    validity: Duration,
    partitioned: Arc<std::sync::atomic::AtomicBool>,
}

impl FakeEngine {
    pub fn new(validity: Duration) -> Self {
        FakeEngine {
            state: Arc::new(AsyncMutex::new(HashMap::new())),
            validity,
            partitioned: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Simulates a backend partition: keepalive tasks started before this
    /// call will observe extend failures and fire their expired channel.
    pub fn partition(&self) {
        self.partitioned.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.partitioned.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    fn is_partitioned(&self) -> bool {
        self.partitioned.load(std::sync::atomic::Ordering::SeqCst)
    }
}

struct FakeMutex {
    state: Arc<AsyncMutex<HashMap<String, Entry>>>,
    full_key: String,
    token: String,
    internal_done: oneshot::Sender<()>,
}

#[async_trait]
impl Engine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn try_acquire(
        &self,
        full_key: &str,
        _timeout: Duration,
    ) -> Result<Option<(Box<dyn HeldMutex>, oneshot::Receiver<()>)>, LockError> {
        let token = fresh_token();
        let mut state = self.state.lock().await;

        if let Some(existing) = state.get(full_key) {
            if existing.until > Instant::now() {
                return Ok(None);
            }
        }

        state.insert(
            full_key.to_owned(),
            Entry { token: token.clone(), until: Instant::now() + self.validity },
        );
        drop(state);

        let (done_tx, done_rx) = oneshot::channel();
        let (internal_tx, mut internal_rx) = oneshot::channel();
        let state_clone = Arc::clone(&self.state);
        let key_owned = full_key.to_owned();
        let token_owned = token.clone();
        let engine = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.validity / 3);
            loop {
                tokio::select! {
                    _ = &mut internal_rx => return,
                    _ = ticker.tick() => {
                        if engine.is_partitioned() {
                            let _ = done_tx.send(());
                            return;
                        }
                        let mut state = state_clone.lock().await;
                        match state.get_mut(&key_owned) {
                            Some(entry) if entry.token == token_owned => {
                                entry.until = Instant::now() + engine.validity;
                            }
                            _ => {
                                drop(state);
                                let _ = done_tx.send(());
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(Some((
            Box::new(FakeMutex {
                state: Arc::clone(&self.state),
                full_key: full_key.to_owned(),
                token,
                internal_done: internal_tx,
            }),
            done_rx,
        )))
    }

    async fn healthy(&self) -> bool {
        !self.is_partitioned()
    }
}

#[async_trait]
impl HeldMutex for FakeMutex {
    async fn unlock(self: Box<Self>) {
        let _ = self.internal_done.send(());
        let mut state = self.state.lock().await;
        if let Some(entry) = state.get(&self.full_key) {
            if entry.token == self.token {
                state.remove(&self.full_key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::lock::BackendLock;
    use crate::options::LockOptions;

    fn handle(engine: &FakeEngine, key: &str) -> BackendLock {
        BackendLock::new(key.to_owned(), Arc::new(engine.clone()), LockOptions::new())
    }

    #[tokio::test]
    async fn try_lock_is_idempotent_under_contention() {
        let engine = FakeEngine::new(Duration::from_millis(200));
        let a = handle(&engine, "k");
        let b = handle(&engine, "k");

        let _expired = a.try_lock().await.unwrap().expect("first try_lock succeeds");
        let second = b.try_lock().await.unwrap();
        assert!(second.is_none(), "held key must report acquired=false, never an error");
    }

    #[tokio::test]
    async fn unlock_then_lock_succeeds_again() {
        let engine = FakeEngine::new(Duration::from_millis(200));
        let a = handle(&engine, "k");
        let b = handle(&engine, "k");

        a.try_lock().await.unwrap().unwrap();
        a.unlock().await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(b.try_lock().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_lock_on_same_handle_blocks_until_first_completes() {
        let engine = FakeEngine::new(Duration::from_secs(5));
        let handle = Arc::new(handle(&engine, "k"));

        handle.lock(CancellationToken::new()).await.unwrap();

        let h2 = Arc::clone(&handle);
        let task = tokio::spawn(async move { h2.lock(CancellationToken::new()).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        handle.unlock().await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn lease_loss_fires_expired_channel_exactly_once() {
        let engine = FakeEngine::new(Duration::from_millis(60));
        let a = handle(&engine, "k");

        let expired = a.try_lock().await.unwrap().unwrap();
        engine.partition();

        tokio::time::timeout(Duration::from_secs(2), expired)
            .await
            .expect("expired channel must fire once the backend is partitioned")
            .unwrap();
    }

    #[tokio::test]
    async fn blocking_lock_retries_until_released() {
        let engine = FakeEngine::new(Duration::from_millis(200));
        let a = handle(&engine, "k");
        let b = Arc::new(handle(&engine, "k"));

        a.try_lock().await.unwrap().unwrap();

        let b2 = Arc::clone(&b);
        let waiter = tokio::spawn(async move { b2.lock(CancellationToken::new()).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        a.unlock().await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("blocked Lock must succeed once the holder releases")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_token_aborts_a_blocking_lock() {
        let engine = FakeEngine::new(Duration::from_secs(5));
        let a = handle(&engine, "k");
        let b = handle(&engine, "k");

        a.try_lock().await.unwrap().unwrap();

        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            cancel2.cancel();
        });

        let result = b.lock(cancel).await;
        assert!(matches!(result, Err(LockError::Cancelled)));
    }
}
