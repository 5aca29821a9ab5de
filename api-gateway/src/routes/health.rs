use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::SharedState;

/// Liveness document.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Network whose actors this gateway serves.
    pub network_id: u64,
}

/// `GET /health`
///
/// Reports liveness without touching the ledger; start-up already verified
/// the ledger preconditions.
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            network_id: state.sequencer.network_id(),
        }),
    )
}
