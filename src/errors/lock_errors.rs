use thiserror::Error;

/// Errors returned by a [`crate::lock::BackendLock`] acquire/unlock
/// transition, surfaced to the gRPC session as `LockEvent::Failed` or a
/// status code.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock is currently held by another owner; returned from a
    /// non-blocking `TryLock` rather than retried.
    #[error("lock {key:?} is already taken")]
    Taken { key: String },

    /// A compare-and-set engine observed a CAS precondition mismatch on an
    /// extend/release that assumed this handle still owned the row.
    #[error("lock {key:?} is no longer owned by this holder")]
    Ownership { key: String },

    /// The backend lease/session backing this lock was lost (expired,
    /// revoked, or the broker connection dropped) while the lock was held.
    #[error("lock {key:?} lease expired")]
    Expired { key: String },

    #[error("backend error acquiring lock {key:?}: {source}")]
    Backend {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("lock acquisition cancelled")]
    Cancelled,

    #[error(transparent)]
    Scheduler(#[from] crate::scheduler::SchedulerError),
}

/// Errors decoding or validating a [`crate::config::BrokerSpec`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse config as JSON or TOML: {0}")]
    Decode(String),

    #[error("exactly one of etcd, jetstream, redis, cassandra must be set, found {0}")]
    AmbiguousBackend(usize),

    #[error("mTLS spec for {field:?} must set exactly one of path or inline data")]
    AmbiguousPem { field: &'static str },

    #[error("mTLS spec for {field:?} must set a path or inline data")]
    MissingPem { field: &'static str },
}

/// Errors selecting or constructing a [`crate::manager::LockManager`] from
/// configuration.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown broker backend {0:?}")]
    UnknownBackend(String),

    #[error("failed to connect to {backend} backend: {source}")]
    Connect {
        backend: &'static str,
        #[source]
        source: anyhow::Error,
    },
}
