//! Metrics and instrumentation for the gateway.
//!
//! This module defines Prometheus-compatible metrics for request handling
//! and exposes a small HTTP exporter that serves `/metrics` in Prometheus
//! text format.
//!
//! Typical usage in the gateway binary:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use pbtx::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//!
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! registry.gateway.observe(RequestKind::GetSeq, StatusCode::Success, elapsed);
//! ```

pub mod prometheus;

pub use prometheus::{GatewayMetrics, MetricsRegistry, run_prometheus_http_server};
