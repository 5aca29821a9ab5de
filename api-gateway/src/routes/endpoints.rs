//! PBTX endpoints.
//!
//! Each endpoint takes one protobuf message as an `application/octet-stream`
//! body and answers with a `RequestResponse` envelope. The body's SHA-256
//! is taken before decoding and echoed back as `request_hash`.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use pbtx::{RequestHash, RequestKind, encode_response};

use crate::state::SharedState;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// `POST {URL_PATH}/register_account`
pub async fn register_account(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle(state, RequestKind::RegisterAccount, peer, &headers, body).await
}

/// `POST {URL_PATH}/get_seq`
pub async fn get_seq(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle(state, RequestKind::GetSeq, peer, &headers, body).await
}

/// `POST {URL_PATH}/send_transaction`
pub async fn send_transaction(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle(state, RequestKind::SendTransaction, peer, &headers, body).await
}

fn is_octet_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(OCTET_STREAM))
}

async fn handle(
    state: SharedState,
    kind: RequestKind,
    peer: SocketAddr,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    if !is_octet_stream(headers) {
        tracing::info!(%peer, kind = kind.label(), "rejected request with wrong content type");
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("expected Content-Type: {OCTET_STREAM}"),
        )
            .into_response();
    }

    let started = Instant::now();
    let hash = RequestHash::of(&body);
    let span = tracing::info_span!(
        "request",
        %peer,
        kind = kind.label(),
        request_hash = %hash.to_hex(),
    );

    // The sequencer runs on its own task: dropping this future when the
    // client goes away must not abort a ledger submission.
    let sequencer = state.sequencer.clone();
    let task = tokio::spawn(
        async move {
            tracing::info!(len = body.len(), "request received");
            match kind {
                RequestKind::RegisterAccount => sequencer.register_account(&body).await,
                RequestKind::GetSeq => sequencer.get_seq(&body).await,
                RequestKind::SendTransaction => sequencer.send_transaction(&body).await,
            }
        }
        .instrument(span.clone()),
    );

    let result = match task.await {
        Ok(result) => result,
        Err(e) => {
            span.in_scope(|| tracing::error!(error = %e, "request task failed"));
            state.metrics.gateway.observe_error(kind, started.elapsed());
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    };

    match result {
        Ok(outcome) => {
            span.in_scope(|| tracing::info!(status = %outcome.status, "responding"));
            state
                .metrics
                .gateway
                .observe(kind, outcome.status, started.elapsed());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM))],
                encode_response(&hash, &outcome),
            )
                .into_response()
        }
        Err(e) if e.is_bad_request() => {
            span.in_scope(|| tracing::info!(error = %e, "bad request"));
            state.metrics.gateway.observe_error(kind, started.elapsed());
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => {
            span.in_scope(|| tracing::error!(error = %e, "request failed"));
            state.metrics.gateway.observe_error(kind, started.elapsed());
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}
