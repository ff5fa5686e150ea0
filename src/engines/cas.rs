use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scylla::Session;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{Engine, HeldMutex};
use crate::errors::LockError;
use crate::globals::{DEFAULT_LOCK_EXPIRY, RETRY_INTERVAL};
use crate::logger;

const INSERT_LOCK: &str =
    "INSERT INTO leases (name, owner) VALUES (?, ?) IF NOT EXISTS USING TTL ?";
const UPDATE_LOCK: &str = "UPDATE leases USING TTL ? SET owner = ? WHERE name = ? IF owner = ?";
const DELETE_LOCK: &str = "DELETE FROM leases WHERE name = ? IF owner = ?";

/// Compare-and-set engine over a `leases(name, owner)` table with
/// lightweight transactions: every mutation is fenced by owner identity so
/// a split-brain session can never silently clobber another holder's lease.
pub struct CasEngine {
    session: Arc<Session>,
    lock_validity: Duration,
}

impl CasEngine {
    pub fn new(session: Arc<Session>) -> Self {
        CasEngine {
            session,
            lock_validity: DEFAULT_LOCK_EXPIRY,
        }
    }

    /// Returns whether the CAS condition was applied, binding the row's
    /// `[applied]` column by reading the typed result rather than the
    /// owner/name columns it returns alongside, which the original
    /// implementation bound by value and then ignored.
    async fn applied(result: scylla::QueryResult) -> Result<bool, anyhow::Error> {
        let rows = result.rows_typed::<(bool,)>()?;
        for row in rows {
            let (applied,) = row?;
            return Ok(applied);
        }
        Ok(false)
    }
}

struct CasMutex {
    session: Arc<Session>,
    full_key: String,
    owner: String,
    internal_done: oneshot::Sender<()>,
}

#[async_trait]
impl Engine for CasEngine {
    fn name(&self) -> &'static str {
        "cassandra"
    }

    async fn try_acquire(
        &self,
        full_key: &str,
        _timeout: Duration,
    ) -> Result<Option<(Box<dyn HeldMutex>, oneshot::Receiver<()>)>, LockError> {
        let owner = Uuid::new_v4().to_string();
        let ttl_secs = self.lock_validity.as_secs() as i32;

        let result = self
            .session
            .query(INSERT_LOCK, (full_key, &owner, ttl_secs))
            .await
            .map_err(|e| LockError::Backend {
                key: full_key.to_owned(),
                source: e.into(),
            })?;

        let applied = Self::applied(result).await.map_err(|e| LockError::Backend {
            key: full_key.to_owned(),
            source: e,
        })?;

        if !applied {
            return Ok(None);
        }

        let (done_tx, done_rx) = oneshot::channel();
        let (internal_tx, mut internal_rx) = oneshot::channel();
        let session = Arc::clone(&self.session);
        let full_key_owned = full_key.to_owned();
        let owner_owned = owner.clone();
        let lock_validity = self.lock_validity;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(lock_validity / 3);
            loop {
                tokio::select! {
                    _ = &mut internal_rx => return,
                    _ = ticker.tick() => {
                        let result = session
                            .query(UPDATE_LOCK, (lock_validity.as_secs() as i32, &owner_owned, &full_key_owned, &owner_owned))
                            .await;
                        let ok = match result {
                            Ok(r) => CasEngine::applied(r).await.unwrap_or(false),
                            Err(_) => false,
                        };
                        if !ok {
                            logger::log("cassandra", &full_key_owned, LockError::Ownership { key: full_key_owned.clone() });
                            let _ = done_tx.send(());
                            return;
                        }
                    }
                }
            }
        });

        Ok(Some((
            Box::new(CasMutex {
                session: Arc::clone(&self.session),
                full_key: full_key.to_owned(),
                owner,
                internal_done: internal_tx,
            }),
            done_rx,
        )))
    }

    async fn healthy(&self) -> bool {
        self.session.query("SELECT now() FROM system.local", ()).await.is_ok()
    }
}

impl CasMutex {
    async fn try_unlock(&self) -> Result<bool, anyhow::Error> {
        let result = self
            .session
            .query(DELETE_LOCK, (&self.full_key, &self.owner))
            .await?;
        CasEngine::applied(result).await
    }
}

#[async_trait]
impl HeldMutex for CasMutex {
    async fn unlock(self: Box<Self>) {
        let _ = self.internal_done.send(());

        if matches!(self.try_unlock().await, Ok(true)) {
            return;
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
        let mut ticker = tokio::time::interval(RETRY_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    logger::log("cassandra", &self.full_key, anyhow::anyhow!("failed to release lease within 60s, relying on TTL"));
                    return;
                }
                _ = ticker.tick() => {
                    if matches!(self.try_unlock().await, Ok(true)) {
                        return;
                    }
                }
            }
        }
    }
}
