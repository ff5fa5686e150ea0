pub const DEFAULT_ADDR: &str = "tcp4://127.0.0.1:5055";
pub const DEFAULT_METRICS_ADDR: &str = "127.0.0.1:9090";
pub const DEFAULT_CONFIG_PATH: &str = "/var/opt/dlock/config.json";

/// Fraction of `LockExpiry` reserved for each network round trip in the
/// quorum engine's acquire/extend loop.
pub const TIMEOUT_FACTOR: f64 = 0.05;

/// Fraction of `LockExpiry` subtracted as clock-drift compensation when the
/// quorum engine computes a lock's remaining validity.
pub const DRIFT_FACTOR: f64 = 0.01;

pub const DEFAULT_LOCK_EXPIRY: std::time::Duration = std::time::Duration::from_secs(60);
pub const LOCK_EXTEND_DELAY: std::time::Duration = std::time::Duration::from_millis(333);
pub const RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);
pub const INACTIVE_THRESHOLD: std::time::Duration = std::time::Duration::from_secs(60);
