use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::OnceLock;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
use opentelemetry_sdk::metrics::MeterProvider as SdkMeterProvider;
use prometheus::{Encoder, Registry as PrometheusRegistry, TextEncoder};

/// Module-scope counters/histograms (§6.2), created once against a
/// configured [`SdkMeterProvider`] and wired up by the Readiness Gate's init
/// closure, mirroring the original's `RegisterMeterProvider`.
pub struct Metrics {
    pub lock_acquisition_count: Counter<u64>,
    pub lock_total_request_count: Counter<u64>,
    pub unlock_success_count: Counter<u64>,
    pub unlock_total_request_count: Counter<u64>,
    pub lock_acquisition_latency: Histogram<f64>,
    pub lock_total_request_latency: Histogram<f64>,
    pub unlock_latency: Histogram<f64>,
    pub lock_held_time: Histogram<f64>,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Builds the Prometheus-backed meter provider and registers the fixed set
/// of counters/histograms. Panics if called twice — mirrors the teacher's
/// `createMetrics` which is only ever invoked from the single init path.
pub fn register(registry: PrometheusRegistry) -> anyhow::Result<SdkMeterProvider> {
    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry)
        .build()?;
    let provider = SdkMeterProvider::builder().with_reader(exporter).build();
    let meter = provider.meter("dlock_server");

    let metrics = Metrics {
        lock_acquisition_count: meter.u64_counter("lock_acquisition_count").init(),
        lock_total_request_count: meter.u64_counter("lock_total_request_count").init(),
        unlock_success_count: meter.u64_counter("unlock_success_count").init(),
        unlock_total_request_count: meter.u64_counter("unlock_total_request_count").init(),
        lock_acquisition_latency: meter
            .f64_histogram("lock_acquisition_latency")
            .with_unit(opentelemetry::metrics::Unit::new("ns"))
            .init(),
        lock_total_request_latency: meter
            .f64_histogram("lock_total_request_latency")
            .with_unit(opentelemetry::metrics::Unit::new("ns"))
            .init(),
        unlock_latency: meter
            .f64_histogram("unlock_latency")
            .with_unit(opentelemetry::metrics::Unit::new("ns"))
            .init(),
        lock_held_time: meter
            .f64_histogram("lock_held_time")
            .with_unit(opentelemetry::metrics::Unit::new("ms"))
            .init(),
    };

    METRICS
        .set(metrics)
        .map_err(|_| anyhow::anyhow!("metrics already registered"))?;
    Ok(provider)
}

pub fn get() -> &'static Metrics {
    METRICS.get().expect("metrics::register must run before the gate fires")
}

async fn serve_metrics(
    registry: PrometheusRegistry,
    _req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let encoder = TextEncoder::new();
    let families = registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        return Ok(Response::builder()
            .status(500)
            .body(Body::from(format!("failed to encode metrics: {e}")))
            .unwrap());
    }
    Ok(Response::new(Body::from(buf)))
}

/// Dedicated `/metrics` HTTP listener, independent of the gRPC port.
pub async fn listen_and_serve(addr: SocketAddr, registry: PrometheusRegistry) -> anyhow::Result<()> {
    crate::info!("starting metrics server..."; "addr" => addr.to_string());
    let make_svc = make_service_fn(move |_conn| {
        let registry = registry.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| serve_metrics(registry.clone(), req)))
        }
    });
    Server::bind(&addr).serve(make_svc).await?;
    Ok(())
}
