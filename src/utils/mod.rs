use std::time::SystemTime;

use rand::rngs::StdRng;
pub use rand::Rng;
use rand::SeedableRng;
use tokio::time::Duration;

pub fn rng_seed_now() -> StdRng {
    StdRng::seed_from_u64(
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64, // max 584 years
    )
}

/// Sleeps for `timeout * (1 + U(-jitter, jitter))`, used to jitter retry
/// loops without ever drifting outside `timeout`'s `+-jitter` band.
pub async fn sleep(timeout: Duration, jitter: f64, rng: Option<&mut StdRng>) {
    let rand = rng.map_or_else(|| rng_seed_now().gen::<f64>(), |rng| rng.gen::<f64>());
    let factor = 1.0 + jitter * (2.0 * rand - 1.0);
    tokio::time::sleep(timeout.mul_f64(factor)).await;
}
