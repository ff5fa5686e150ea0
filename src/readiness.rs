use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::BrokerSpec;
use crate::errors::BrokerError;
use crate::manager::LockManager;
use crate::registry::Registry;

/// One-shot initialization barrier guarding the [`LockManager`] handle
/// (Component H). The first caller runs the init closure (decode config,
/// select a broker via the [`Registry`], connect); concurrent and later
/// callers observe the same result rather than re-running it. Health
/// queries must treat an unfired gate as `NOT_SERVING` — the manager build
/// is a blocking call against the backend, so readiness must not lie.
#[derive(Default)]
pub struct ReadinessGate {
    manager: OnceCell<Arc<LockManager>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the init closure at most once, regardless of how many callers
    /// race to call this concurrently. A failed init leaves the gate unfired
    /// so a later retry (e.g. after fixing config) can still succeed.
    pub async fn init(&self, spec: &BrokerSpec, registry: &Registry) -> Result<Arc<LockManager>, BrokerError> {
        self.manager
            .get_or_try_init(|| async { registry.build(spec).await.map(Arc::new) })
            .await
            .cloned()
    }

    /// `None` before the gate fires — callers must map this to
    /// `NOT_SERVING` rather than blocking.
    pub fn manager(&self) -> Option<Arc<LockManager>> {
        self.manager.get().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.manager.initialized()
    }
}
