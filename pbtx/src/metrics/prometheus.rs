//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and the gateway's request metrics, and an async HTTP exporter
//! that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode as HttpStatus, body::Incoming, header,
    server::conn::http1, service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::types::{RequestKind, StatusCode};

/// Request-level Prometheus metrics.
#[derive(Clone)]
pub struct GatewayMetrics {
    /// Responses sent, by request kind and status name.
    pub responses_total: IntCounterVec,
    /// Requests that ended without a status: malformed input, corrupted
    /// ledger state or a failed ledger call.
    pub internal_errors_total: IntCounterVec,
    /// Handling latency per request kind, in seconds.
    pub request_seconds: HistogramVec,
}

impl GatewayMetrics {
    /// Registers gateway metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let responses_total = IntCounterVec::new(
            Opts::new("responses_total", "Responses sent, by request kind and status"),
            &["kind", "status"],
        )?;
        registry.register(Box::new(responses_total.clone()))?;

        let internal_errors_total = IntCounterVec::new(
            Opts::new(
                "internal_errors_total",
                "Requests that failed before a status could be assigned",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(internal_errors_total.clone()))?;

        // Ledger round trips dominate, hence the long tail.
        let request_seconds = HistogramVec::new(
            HistogramOpts::new("request_seconds", "Time to handle a request in seconds")
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
            &["kind"],
        )?;
        registry.register(Box::new(request_seconds.clone()))?;

        Ok(Self {
            responses_total,
            internal_errors_total,
            request_seconds,
        })
    }

    pub fn observe(&self, kind: RequestKind, status: StatusCode, elapsed: Duration) {
        self.responses_total
            .with_label_values(&[kind.label(), status.name()])
            .inc();
        self.request_seconds
            .with_label_values(&[kind.label()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn observe_error(&self, kind: RequestKind, elapsed: Duration) {
        self.internal_errors_total
            .with_label_values(&[kind.label()])
            .inc();
        self.request_seconds
            .with_label_values(&[kind.label()])
            .observe(elapsed.as_secs_f64());
    }
}

/// Wrapper around a Prometheus registry and the gateway metrics.
///
/// This is the handle passed around in the gateway. It can be wrapped in
/// an [`Arc`] and shared across tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub gateway: GatewayMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the gateway metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("pbtx".to_string()), None)?;
        let gateway = GatewayMetrics::register(&registry)?;
        Ok(Self { registry, gateway })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics exporter listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::debug!(error = %err, "metrics connection closed with error");
            }
        });
    }
}

fn respond(status: HttpStatus, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body)));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    resp
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => Ok(respond(
            HttpStatus::OK,
            "text/plain; version=0.0.4",
            metrics.gather_text(),
        )),
        _ => Ok(respond(
            HttpStatus::NOT_FOUND,
            "text/plain",
            "not found".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn gateway_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = GatewayMetrics::register(&registry).expect("register metrics");

        metrics.observe(
            RequestKind::SendTransaction,
            StatusCode::InvalidSeq,
            Duration::from_millis(12),
        );
        metrics.observe_error(RequestKind::GetSeq, Duration::from_millis(3));

        assert_eq!(
            metrics
                .responses_total
                .with_label_values(&["send_transaction", "INVALID_SEQ"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .internal_errors_total
                .with_label_values(&["get_seq"])
                .get(),
            1
        );
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry
            .gateway
            .observe(RequestKind::GetSeq, StatusCode::Success, Duration::from_millis(1));
        let text = registry.gather_text();
        assert!(text.contains("pbtx_responses_total"));
        assert!(text.contains("status=\"SUCCESS\""));
    }
}
