use tokio::signal::unix::{signal, SignalKind};

/// Waits for SIGINT or SIGTERM, whichever arrives first. Used by `dlock`'s
/// main loop to trigger a graceful `grpc` shutdown — the server finishes
/// in-flight `Lock` streams' current event before dropping the listener.
pub async fn wait_for_shutdown() {
    let mut int = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = int.recv() => crate::info!("received SIGINT, shutting down"),
        _ = term.recv() => crate::info!("received SIGTERM, shutting down"),
    }
}
