//! Shared application state.

use std::sync::Arc;

use pbtx::{MetricsRegistry, Sequencer};

/// State held by request handlers.
///
/// This is wrapped in an [`Arc`] and passed to handlers via Axum's `State`
/// extractor. It contains no per-request mutable data: all durable state
/// lives in the ledger behind the sequencer.
pub struct AppState {
    pub sequencer: Sequencer,
    /// Metrics registry shared with the exporter.
    pub metrics: Arc<MetricsRegistry>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
