use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tonic_health::server::HealthReporter;

use crate::config::BrokerSpec;
use crate::metrics;
use crate::options::LockOptions;
use crate::proto::dlock_server::{Dlock, DlockServer};
use crate::proto::{LockEvent, LockRequest, LockResponse};
use crate::readiness::ReadinessGate;
use crate::registry::Registry;

/// gRPC streaming session (Component G). Per inbound `Lock` call: validate,
/// check readiness, acquire through the Lock Manager, emit exactly one of
/// `{Acquired, Failed}`, then wait for the stream to end or the lease to
/// expire before releasing.
pub struct LockSession {
    gate: Arc<ReadinessGate>,
    spec: BrokerSpec,
    registry: Registry,
}

impl LockSession {
    pub fn new(spec: BrokerSpec) -> Self {
        LockSession {
            gate: Arc::new(ReadinessGate::new()),
            spec,
            registry: Registry::new(),
        }
    }

    pub fn gate(&self) -> Arc<ReadinessGate> {
        Arc::clone(&self.gate)
    }

    /// Runs the Readiness Gate's init closure: decode the broker spec,
    /// select an engine via the registry, connect. Called once from `main`
    /// before the server starts accepting `Lock` calls.
    pub async fn init_gate(&self) -> Result<(), crate::errors::BrokerError> {
        self.gate.init(&self.spec, &self.registry).await.map(drop)
    }
}

type LockStreamResult = Result<LockResponse, Status>;

#[tonic::async_trait]
impl Dlock for LockSession {
    type LockStream = Pin<Box<dyn Stream<Item = LockStreamResult> + Send + 'static>>;

    async fn lock(
        &self,
        request: Request<LockRequest>,
    ) -> Result<Response<Self::LockStream>, Status> {
        let req = request.into_inner();
        if req.key.is_empty() {
            return Err(Status::invalid_argument("key is required"));
        }

        metrics::get().lock_total_request_count.add(1, &[]);

        let manager = self
            .gate
            .manager()
            .ok_or_else(|| Status::unavailable("no lock backend"))?;

        let (tx, rx) = mpsc::channel(1);
        let try_lock = req.try_lock;
        let key = req.key.clone();

        tokio::spawn(async move {
            let request_start = Instant::now();
            let locker = manager.new_lock(&key, LockOptions::new());
            let cancel = tokio_util::sync::CancellationToken::new();

            let acquire = async {
                if try_lock {
                    locker.try_lock().await.map(|opt| opt.ok_or(()))
                } else {
                    locker.lock(cancel.clone()).await.map(Ok)
                }
            };

            let expired = tokio::select! {
                result = acquire => match result {
                    Ok(Ok(expired)) => expired,
                    Ok(Err(())) => {
                        crate::warn!("failed to acquire non-blocking lock"; "key" => key.as_str());
                        let _ = tx
                            .send(Ok(LockResponse { event: LockEvent::Failed as i32 }))
                            .await;
                        return;
                    }
                    Err(e) => {
                        crate::error!("failed to acquire lock"; "key" => key.as_str(), "error" => e.to_string());
                        let _ = tx.send(Err(Status::internal(e.to_string()))).await;
                        return;
                    }
                },
                _ = tx.closed() => {
                    // Client disconnected before the lock was acquired.
                    cancel.cancel();
                    return;
                }
            };

            metrics::get().lock_acquisition_count.add(1, &[]);
            let hold_start = Instant::now();
            let acquisition_ns = hold_start.duration_since(request_start).as_nanos() as f64;
            metrics::get().lock_acquisition_latency.record(acquisition_ns, &[]);

            if tx
                .send(Ok(LockResponse { event: LockEvent::Acquired as i32 }))
                .await
                .is_err()
            {
                // Receiver already dropped the stream; still unlock below.
            }

            tokio::select! {
                _ = tx.closed() => {
                    crate::trace!("lock request stream ended, releasing"; "key" => key.as_str());
                }
                _ = expired => {
                    let err = crate::errors::LockError::Expired { key: key.clone() };
                    crate::warn!("lock expired from storage backend"; "key" => key.as_str());
                    let _ = tx.send(Err(Status::cancelled(err.to_string()))).await;
                }
            }

            let held_ms = hold_start.elapsed().as_millis() as f64;
            metrics::get().lock_held_time.record(held_ms, &[]);

            metrics::get().unlock_total_request_count.add(1, &[]);
            let unlock_start = Instant::now();
            let unlock_result = locker.unlock().await;
            let unlock_ns = unlock_start.elapsed().as_nanos() as f64;
            metrics::get().unlock_latency.record(unlock_ns, &[]);

            if let Err(e) = unlock_result {
                crate::error!("failed to unlock lock"; "key" => key.as_str(), "error" => e.to_string());
            } else {
                metrics::get().unlock_success_count.add(1, &[]);
            }

            let total_ns = request_start.elapsed().as_nanos() as f64;
            metrics::get().lock_total_request_latency.record(total_ns, &[]);
        });

        let stream = ReceiverStream::new(rx);
        Ok(Response::new(Box::pin(stream)))
    }
}

/// Drives the health reporter's `dlock` service status from the readiness
/// gate plus an engine health probe, re-checked on an interval.
pub async fn drive_health(mut reporter: HealthReporter, gate: Arc<ReadinessGate>) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(5));
    loop {
        ticker.tick().await;
        match gate.manager() {
            Some(manager) if manager.health().await => {
                reporter.set_serving::<DlockServer<LockSession>>().await;
            }
            _ => {
                reporter.set_not_serving::<DlockServer<LockSession>>().await;
            }
        }
    }
}
