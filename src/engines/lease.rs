use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{Client, LockOptions as EtcdLockOptions};
use tokio::sync::oneshot;

use super::{Engine, HeldMutex};
use crate::errors::LockError;
use crate::logger;

/// Lease engine backed by etcd: a server-side session (lease) keeps a
/// per-key lock alive via heartbeat; release forcibly orphans the session
/// so the lease expires on its own TTL even if the remote unlock call never
/// lands (Atomicity B).
pub struct LeaseEngine {
    client: Client,
    lease_ttl_secs: i64,
}

impl LeaseEngine {
    pub fn new(client: Client, lease_ttl: Duration) -> Self {
        LeaseEngine {
            client,
            lease_ttl_secs: lease_ttl.as_secs().max(1) as i64,
        }
    }
}

struct EtcdMutex {
    client: Client,
    lease_id: i64,
    lock_key: Vec<u8>,
    internal_done: oneshot::Sender<()>,
}

#[async_trait]
impl Engine for LeaseEngine {
    fn name(&self) -> &'static str {
        "etcd"
    }

    async fn try_acquire(
        &self,
        full_key: &str,
        timeout: Duration,
    ) -> Result<Option<(Box<dyn HeldMutex>, oneshot::Receiver<()>)>, LockError> {
        let mut client = self.client.clone();

        let lease = tokio::time::timeout(timeout, client.lease_grant(self.lease_ttl_secs, None))
            .await
            .map_err(|_| LockError::Backend {
                key: full_key.to_owned(),
                source: anyhow::anyhow!("lease grant timed out"),
            })?
            .map_err(|e| LockError::Backend {
                key: full_key.to_owned(),
                source: e.into(),
            })?;
        let lease_id = lease.id();

        let mut lock_client = client.lock_client();
        let lock = tokio::time::timeout(
            timeout,
            lock_client.lock(
                full_key.as_bytes().to_vec(),
                Some(EtcdLockOptions::new().with_lease(lease_id)),
            ),
        )
        .await
        .map_err(|_| LockError::Backend {
            key: full_key.to_owned(),
            source: anyhow::anyhow!("lock acquisition timed out"),
        })?
        .map_err(|e| LockError::Backend {
            key: full_key.to_owned(),
            source: e.into(),
        })?;

        let lock_key = lock.key().to_vec();

        let (mut keepalive_tx, mut keepalive_rx) = client
            .lease_keep_alive(lease_id)
            .await
            .map_err(|e| LockError::Backend {
                key: full_key.to_owned(),
                source: e.into(),
            })?;

        let (done_tx, done_rx) = oneshot::channel();
        let (internal_tx, mut internal_rx) = oneshot::channel();

        let full_key_owned = full_key.to_owned();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = &mut internal_rx => return,
                    _ = ticker.tick() => {
                        if keepalive_tx.keep_alive().await.is_err() {
                            logger::log("etcd", &full_key_owned, anyhow::anyhow!("keepalive send failed, session lost"));
                            let _ = done_tx.send(());
                            return;
                        }
                        if keepalive_rx.message().await.ok().flatten().is_none() {
                            logger::log("etcd", &full_key_owned, anyhow::anyhow!("session done, releasing lock early"));
                            let _ = done_tx.send(());
                            return;
                        }
                    }
                }
            }
        });

        Ok(Some((
            Box::new(EtcdMutex {
                client,
                lease_id,
                lock_key,
                internal_done: internal_tx,
            }),
            done_rx,
        )))
    }

    async fn healthy(&self) -> bool {
        let mut client = self.client.clone();
        tokio::time::timeout(Duration::from_secs(60), client.status())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }
}

#[async_trait]
impl HeldMutex for EtcdMutex {
    async fn unlock(self: Box<Self>) {
        let _ = self.internal_done.send(());

        let mut client = self.client.clone();
        let mut lock_client = client.lock_client();
        let unlock_result = tokio::time::timeout(
            Duration::from_secs(60),
            lock_client.unlock(self.lock_key.clone()),
        )
        .await;

        if !matches!(unlock_result, Ok(Ok(_))) {
            logger::log(
                "etcd",
                &String::from_utf8_lossy(&self.lock_key),
                anyhow::anyhow!("failed to unlock mutex, relying on lease TTL"),
            );
        }

        // Sessions must be forcibly orphaned so a non-blocking unlock still
        // always unlocks eventually: revoke the lease rather than trusting
        // keepalive to stop on its own.
        let _ = client.lease_revoke(self.lease_id).await;
    }
}
