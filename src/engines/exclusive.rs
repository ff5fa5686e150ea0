use std::time::Duration;

use async_nats::jetstream::consumer::AckPolicy;
use async_nats::jetstream::stream::{Config as StreamConfig, RetentionPolicy};
use async_nats::jetstream::Context as JetStreamContext;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{Engine, HeldMutex};
use crate::errors::LockError;
use crate::globals::{INACTIVE_THRESHOLD, RETRY_INTERVAL};
use crate::logger;

/// Exclusive-consumer engine over a stream broker: a per-key stream capped
/// at `MaxConsumers = 1` is the lock, a durable consumer is the holder.
pub struct ExclusiveEngine {
    js: JetStreamContext,
}

impl ExclusiveEngine {
    pub fn new(js: JetStreamContext) -> Self {
        ExclusiveEngine { js }
    }
}

fn sanitize(full_key: &str) -> String {
    full_key.replace('/', "-").replace('.', "_")
}

struct JetStreamMutex {
    js: JetStreamContext,
    stream_name: String,
    consumer_name: String,
    internal_done: oneshot::Sender<()>,
}

#[async_trait]
impl Engine for ExclusiveEngine {
    fn name(&self) -> &'static str {
        "jetstream"
    }

    async fn try_acquire(
        &self,
        full_key: &str,
        _timeout: Duration,
    ) -> Result<Option<(Box<dyn HeldMutex>, oneshot::Receiver<()>)>, LockError> {
        let stream_name = sanitize(full_key);

        self.js
            .get_or_create_stream(StreamConfig {
                name: stream_name.clone(),
                retention: RetentionPolicy::Interest,
                subjects: vec![format!("{stream_name}.lease.*")],
                max_consumers: 1,
                ..Default::default()
            })
            .await
            .map_err(|e| LockError::Backend {
                key: full_key.to_owned(),
                source: e.into(),
            })?;

        let consumer_name = Uuid::new_v4().to_string();
        let heartbeat = RETRY_INTERVAL.max(Duration::from_millis(100));

        let stream = self
            .js
            .get_stream(&stream_name)
            .await
            .map_err(|e| LockError::Backend {
                key: full_key.to_owned(),
                source: e.into(),
            })?;

        let consumer_result = stream
            .create_consumer(async_nats::jetstream::consumer::push::Config {
                durable_name: Some(consumer_name.clone()),
                deliver_subject: consumer_name.clone(),
                ack_policy: AckPolicy::Explicit,
                inactive_threshold: INACTIVE_THRESHOLD,
                idle_heartbeat: heartbeat,
                ..Default::default()
            })
            .await;

        let consumer = match consumer_result {
            Ok(c) => c,
            Err(e) => {
                if e.to_string().contains("maximum consumers limit reached") {
                    return Ok(None);
                }
                return Err(LockError::Backend {
                    key: full_key.to_owned(),
                    source: e.into(),
                });
            }
        };

        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| LockError::Backend {
                key: full_key.to_owned(),
                source: e.into(),
            })?;

        let (done_tx, done_rx) = oneshot::channel();
        let (internal_tx, mut internal_rx) = oneshot::channel();
        let full_key_owned = full_key.to_owned();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut internal_rx => return,
                    msg = messages.next() => {
                        match msg {
                            Some(Ok(msg)) => {
                                if let Err(e) = msg.ack().await {
                                    logger::log("jetstream", &full_key_owned, anyhow::anyhow!("failed to ack heartbeat: {e}"));
                                }
                            }
                            _ => {
                                logger::log("jetstream", &full_key_owned, anyhow::anyhow!("consumer stream closed, releasing lock early"));
                                let _ = done_tx.send(());
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(Some((
            Box::new(JetStreamMutex {
                js: self.js.clone(),
                stream_name,
                consumer_name,
                internal_done: internal_tx,
            }),
            done_rx,
        )))
    }

    async fn healthy(&self) -> bool {
        self.js.account_info().await.is_ok()
    }
}

impl JetStreamMutex {
    fn is_released<E: std::fmt::Display>(err: &E) -> bool {
        err.to_string().to_lowercase().contains("not found")
    }

    async fn try_unlock(&self) -> Result<(), anyhow::Error> {
        let mut errors = Vec::new();
        if let Err(e) = self
            .js
            .delete_consumer_from_stream(&self.stream_name, &self.consumer_name)
            .await
        {
            if !Self::is_released(&e) {
                errors.push(e.to_string());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(errors.join("; ")))
        }
    }
}

#[async_trait]
impl HeldMutex for JetStreamMutex {
    async fn unlock(self: Box<Self>) {
        let _ = self.internal_done.send(());

        if self.try_unlock().await.is_ok() {
            return;
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
        let mut ticker = tokio::time::interval(RETRY_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    logger::log("jetstream", &self.stream_name, anyhow::anyhow!("failed to release consumer within 60s, relying on inactive threshold"));
                    return;
                }
                _ = ticker.tick() => {
                    if self.try_unlock().await.is_ok() {
                        return;
                    }
                }
            }
        }
    }
}
