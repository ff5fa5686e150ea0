use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::Script;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::{fresh_token, Engine, HeldMutex};
use crate::errors::LockError;
use crate::globals::{DRIFT_FACTOR, LOCK_EXTEND_DELAY};
use crate::logger;

static DELETE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

static TOUCH_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Redlock-style engine over `N` independent Redis pools: majority acquire,
/// drift-compensated validity, periodic extension, fenced release.
pub struct QuorumEngine {
    pools: Vec<Pool>,
    quorum: usize,
    lock_expiry: Duration,
}

impl QuorumEngine {
    pub fn new(pools: Vec<Pool>, lock_expiry: Duration) -> Self {
        let quorum = pools.len() / 2 + 1;
        QuorumEngine {
            pools,
            quorum,
            lock_expiry,
        }
    }

    fn drift(&self) -> Duration {
        self.lock_expiry.mul_f64(DRIFT_FACTOR)
    }

    fn timeout_factor(&self) -> Duration {
        self.lock_expiry.mul_f64(crate::globals::TIMEOUT_FACTOR)
    }

    /// Fans `act` out over every pool concurrently, classifying each
    /// response as success/taken/error. Returns the success count and, when
    /// at least `quorum` nodes reported the key taken by someone else, the
    /// combined error is [`LockError::Taken`].
    async fn act_on_pools<F, Fut>(&self, full_key: &str, act: F) -> (usize, Option<LockError>)
    where
        F: Fn(Pool, String) -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Result<bool, anyhow::Error>> + Send,
    {
        let results = futures::future::join_all(self.pools.iter().map(|pool| {
            let pool = pool.clone();
            let key = full_key.to_owned();
            let act = &act;
            async move { act(pool, key).await }
        }))
        .await;

        let mut successes = 0;
        let mut taken = 0;
        let mut last_err = None;
        for result in results {
            match result {
                Ok(true) => successes += 1,
                Ok(false) => taken += 1,
                Err(e) => last_err = Some(e),
            }
        }

        if taken >= self.quorum {
            return (
                successes,
                Some(LockError::Taken {
                    key: full_key.to_owned(),
                }),
            );
        }
        (
            successes,
            last_err.map(|source| LockError::Backend {
                key: full_key.to_owned(),
                source,
            }),
        )
    }

    async fn release_all(&self, full_key: &str, token: &str) {
        let script = Script::new(DELETE_SCRIPT);
        let (successes, _) = self
            .act_on_pools(full_key, |pool, key| {
                let script = script.clone();
                let token = token.to_owned();
                async move {
                    let mut conn = pool.get().await?;
                    let status: i64 = script.key(key).arg(token).invoke_async(&mut conn).await?;
                    Ok(status != 0)
                }
            })
            .await;
        if successes < self.quorum {
            logger::log(
                "redis",
                full_key,
                anyhow::anyhow!("failed to release lock on a quorum of nodes"),
            );
        }
    }
}

struct RedisMutex {
    engine: Arc<QuorumPools>,
    full_key: String,
    token: String,
    internal_done: oneshot::Sender<()>,
}

/// Shared, cloneable handle to the pools + quorum so the keepalive task can
/// outlive the [`RedisMutex`] value that spawned it.
struct QuorumPools {
    pools: Vec<Pool>,
    quorum: usize,
    lock_expiry: Duration,
}

#[async_trait]
impl Engine for QuorumEngine {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn try_acquire(
        &self,
        full_key: &str,
        _timeout: Duration,
    ) -> Result<Option<(Box<dyn HeldMutex>, oneshot::Receiver<()>)>, LockError> {
        let token = fresh_token();
        let start = Instant::now();

        let acquire_timeout = self.timeout_factor();
        let successes = tokio::time::timeout(acquire_timeout, self.act_on_pools(full_key, {
            let expiry_ms = self.lock_expiry.as_millis() as usize;
            let token = token.clone();
            move |pool, key| {
                let token = token.clone();
                async move {
                    let mut conn = pool.get().await?;
                    let reply: bool = redis::cmd("SET")
                        .arg(&key)
                        .arg(&token)
                        .arg("NX")
                        .arg("PX")
                        .arg(expiry_ms)
                        .query_async::<Option<String>>(&mut conn)
                        .await
                        .map(|v| v.is_some())?;
                    Ok(reply)
                }
            }
        }))
        .await;

        let (successes, acquire_err) = match successes {
            Ok(pair) => pair,
            Err(_) => (0, Some(LockError::Backend {
                key: full_key.to_owned(),
                source: anyhow::anyhow!("acquire timed out across all nodes"),
            })),
        };

        let now = Instant::now();
        let until = now + self.lock_expiry - (now - start) - self.drift();

        let pools = Arc::new(QuorumPools {
            pools: self.pools.clone(),
            quorum: self.quorum,
            lock_expiry: self.lock_expiry,
        });

        if successes >= self.quorum && now < until {
            let (done_tx, done_rx) = oneshot::channel();
            let (internal_tx, internal_rx) = oneshot::channel();
            spawn_keepalive(Arc::clone(&pools), full_key.to_owned(), token.clone(), until, internal_rx, done_tx);
            return Ok(Some((
                Box::new(RedisMutex {
                    engine: pools,
                    full_key: full_key.to_owned(),
                    token,
                    internal_done: internal_tx,
                }),
                done_rx,
            )));
        }

        // Not acquired, or acquired too late to be valid: best-effort release.
        self.release_all(full_key, &token).await;
        match acquire_err {
            Some(LockError::Taken { .. }) => Ok(None),
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn healthy(&self) -> bool {
        for pool in &self.pools {
            if pool.get().await.is_ok() {
                return true;
            }
        }
        false
    }
}

fn spawn_keepalive(
    pools: Arc<QuorumPools>,
    full_key: String,
    token: String,
    mut until: Instant,
    mut internal_done: oneshot::Receiver<()>,
    done: oneshot::Sender<()>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LOCK_EXTEND_DELAY);
        loop {
            tokio::select! {
                _ = &mut internal_done => return,
                _ = interval.tick() => {
                    let start = Instant::now();
                    let script = Script::new(TOUCH_SCRIPT);
                    let expiry_ms = pools.lock_expiry.as_millis() as usize;
                    let quorum = pools.quorum;
                    let successes = futures::future::join_all(pools.pools.iter().map(|pool| {
                        let pool = pool.clone();
                        let script = script.clone();
                        let key = full_key.clone();
                        let token = token.clone();
                        async move {
                            let mut conn = pool.get().await.ok()?;
                            let status: i64 = script.key(key).arg(token).arg(expiry_ms).invoke_async(&mut conn).await.ok()?;
                            Some(status != 0)
                        }
                    }))
                    .await
                    .into_iter()
                    .filter(|r| matches!(r, Some(true)))
                    .count();

                    if successes < quorum {
                        logger::log("redis", &full_key, anyhow::anyhow!("failed to extend lock on a quorum of nodes"));
                        let _ = done.send(());
                        return;
                    }

                    let now = Instant::now();
                    let drift = pools.lock_expiry.mul_f64(DRIFT_FACTOR);
                    until = now + pools.lock_expiry - (now - start) - drift;
                    if now > until {
                        let _ = done.send(());
                        return;
                    }
                }
            }
        }
    });
}

#[async_trait]
impl HeldMutex for RedisMutex {
    async fn unlock(self: Box<Self>) {
        let _ = self.internal_done.send(());
        let script = Script::new(DELETE_SCRIPT);
        let successes = futures::future::join_all(self.engine.pools.iter().map(|pool| {
            let pool = pool.clone();
            let script = script.clone();
            let key = self.full_key.clone();
            let token = self.token.clone();
            async move {
                let mut conn = pool.get().await.ok()?;
                let status: i64 = script.key(key).arg(token).invoke_async(&mut conn).await.ok()?;
                Some(status != 0)
            }
        }))
        .await
        .into_iter()
        .filter(|r| matches!(r, Some(true)))
        .count();

        if successes < self.engine.quorum {
            logger::log(
                "redis",
                &self.full_key,
                anyhow::anyhow!("failed to release lock on a quorum of nodes on unlock"),
            );
        }
    }
}
