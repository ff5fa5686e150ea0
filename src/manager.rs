use std::sync::Arc;
use std::time::Duration;

use crate::engines::Engine;
use crate::lock::BackendLock;
use crate::options::LockOptions;

/// Backend-agnostic factory (Component E). Holds the shared client/pool for
/// one backend and the common prefix every full key is built from
/// (`"lock"`), so handles never embed backend selection logic.
pub struct LockManager {
    engine: Arc<dyn Engine>,
    prefix: String,
}

impl LockManager {
    pub fn new(engine: Arc<dyn Engine>, prefix: impl Into<String>) -> Self {
        LockManager { engine, prefix: prefix.into() }
    }

    pub fn backend(&self) -> &'static str {
        self.engine.name()
    }

    /// Builds the `prefix/key` full key and wraps a fresh handle around the
    /// shared engine. A handle is constructed per request and never reused
    /// across requests (§3 Ownership).
    pub fn new_lock(&self, key: &str, options: LockOptions) -> BackendLock {
        let full_key = format!("{}/{}", self.prefix, key);
        BackendLock::new(full_key, Arc::clone(&self.engine), options)
    }

    /// 60s-bounded health probe delegated to the engine, used by the gRPC
    /// `Health.Check` handler and `nodectl inspect`.
    pub async fn health(&self) -> bool {
        tokio::time::timeout(Duration::from_secs(60), self.engine.healthy())
            .await
            .unwrap_or(false)
    }
}
