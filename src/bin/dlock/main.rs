use std::net::SocketAddr;

use clap::Parser;
use prometheus::Registry as PrometheusRegistry;

use dlock::config;
use dlock::globals::{DEFAULT_ADDR, DEFAULT_CONFIG_PATH, DEFAULT_METRICS_ADDR};
use dlock::proto::dlock_server::DlockServer;
use dlock::session::LockSession;

#[derive(Parser, Debug)]
#[command(name = "dlock", version, about = "Distributed mutual-exclusion lock server")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[arg(long, default_value = DEFAULT_ADDR)]
    addr: String,

    #[arg(long = "metrics-addr", default_value = DEFAULT_METRICS_ADDR)]
    metrics_addr: String,

    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

/// Strips a `scheme://` prefix (`tcp4://`, `tcp6://`, `tcp://`) from a
/// listen address, the way the original parsed `url.Parse(addr).Host`.
fn strip_scheme(addr: &str) -> &str {
    addr.split("://").last().unwrap_or(addr)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dlock::logger::set_log_level(parse_level(&args.log_level));

    crate_info(&args);

    let spec = config::load(&args.config)?;
    let session = LockSession::new(spec);

    let prom_registry = PrometheusRegistry::new();
    let provider = dlock::metrics::register(prom_registry.clone())?;
    let _ = provider;

    session.init_gate().await?;
    dlock::info!("successfully acquired lock manager backend");

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter.set_serving::<DlockServer<LockSession>>().await;
    let gate = session.gate();
    tokio::spawn(dlock::session::drive_health(health_reporter, gate));

    let grpc_addr: SocketAddr = strip_scheme(&args.addr).parse()?;
    let metrics_addr: SocketAddr = args.metrics_addr.parse()?;

    dlock::info!("starting distributed lock server"; "addr" => args.addr.as_str());

    // Server params (Time=15s, Timeout=5s). tonic has no direct equivalent
    // of grpc-go's separate keepalive *enforcement* policy (MinTime,
    // PermitWithoutStream) for rejecting overly-frequent client pings.
    let grpc = tonic::transport::Server::builder()
        .http2_keepalive_interval(Some(std::time::Duration::from_secs(15)))
        .http2_keepalive_timeout(Some(std::time::Duration::from_secs(5)))
        .add_service(health_service)
        .add_service(DlockServer::new(session))
        .serve_with_shutdown(grpc_addr, dlock::signals::wait_for_shutdown());

    let metrics = dlock::metrics::listen_and_serve(metrics_addr, prom_registry);

    tokio::select! {
        result = grpc => result.map_err(anyhow::Error::from),
        result = metrics => result,
    }
}

fn crate_info(args: &Args) {
    dlock::info!("dlock starting up"; "config" => args.config.as_str(), "log_level" => args.log_level.as_str());
}

fn parse_level(level: &str) -> dlock::logger::Level {
    match level.to_lowercase().as_str() {
        "trace" => dlock::logger::Level::Trace,
        "debug" => dlock::logger::Level::Debug,
        "warn" | "warning" => dlock::logger::Level::Warning,
        "error" => dlock::logger::Level::Error,
        "critical" | "fatal" => dlock::logger::Level::Critical,
        _ => dlock::logger::Level::Info,
    }
}
