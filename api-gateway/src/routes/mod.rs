//! HTTP routes.

pub mod health;
pub mod endpoints;

use axum::{
    Router,
    routing::{get, post},
};

use pbtx::RequestKind;

use crate::state::SharedState;

/// Builds the gateway router with the PBTX endpoints under `url_path`.
pub fn router(state: SharedState, url_path: &str) -> Router {
    let mut app = Router::new().route("/health", get(health::health));
    for kind in RequestKind::ALL {
        let path = format!("{url_path}{}", kind.path());
        app = match kind {
            RequestKind::RegisterAccount => app.route(&path, post(endpoints::register_account)),
            RequestKind::GetSeq => app.route(&path, post(endpoints::get_seq)),
            RequestKind::SendTransaction => app.route(&path, post(endpoints::send_transaction)),
        };
    }
    app.with_state(state)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::{
        body::Body,
        extract::connect_info::MockConnectInfo,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use prost::Message;
    use tower::ServiceExt;

    use pbtx::{
        ChainError, GetSeq, InMemoryLedger, K1PrivateKey, KeyType, KeyWeight, MetricsRegistry,
        Permission, PublicKey, RegisterAccount, RequestHash, RequestResponse, SeqRecord,
        Sequencer, StatusCode as PbtxStatus, Transaction, TransactionBody,
    };

    use super::*;
    use crate::state::AppState;

    const NET: u64 = 11;

    fn app(ledger: Arc<InMemoryLedger>) -> (Router, Arc<MetricsRegistry>) {
        let metrics = Arc::new(MetricsRegistry::new().expect("metrics"));
        let state = Arc::new(AppState {
            sequencer: Sequencer::new(NET, ledger),
            metrics: metrics.clone(),
        });
        let app = router(state, "/pbtx").layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        (app, metrics)
    }

    fn ledger() -> Arc<InMemoryLedger> {
        Arc::new(InMemoryLedger::new().with_network(NET, "pbtx", "admin", "worker"))
    }

    fn post(path: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(body))
            .expect("request")
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.oneshot(req).await.expect("infallible");
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes()
            .to_vec();
        (status, body)
    }

    fn envelope(body: &[u8]) -> RequestResponse {
        RequestResponse::decode(body).expect("envelope decodes")
    }

    #[tokio::test]
    async fn health_reports_network() {
        let (app, _) = app(ledger());
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("request");
        let (status, body) = call(app, req).await;
        assert_eq!(status, StatusCode::OK);
        let doc: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(doc["status"], "ok");
        assert_eq!(doc["network_id"], NET);
    }

    #[tokio::test]
    async fn register_then_get_seq_over_http() {
        let ledger = ledger();
        let (app, metrics) = app(ledger.clone());
        let k = K1PrivateKey::from_secret_bytes(&[3; 32]).expect("key");
        let perm = Permission {
            actor: 77,
            threshold: 1,
            keys: vec![KeyWeight {
                key: Some(PublicKey {
                    r#type: KeyType::EosioKey as i32,
                    key_bytes: k.public_key().to_wire(),
                }),
                weight: 1,
            }],
        }
        .encode_to_vec();
        let raw = RegisterAccount {
            signature: k.sign_message(&perm).expect("sign").to_wire(),
            permission_bytes: perm,
            credentials: None,
        }
        .encode_to_vec();

        let (status, body) = call(app.clone(), post("/pbtx/register_account", raw.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let resp = envelope(&body);
        assert_eq!(resp.status(), PbtxStatus::Success);
        assert_eq!(resp.request_hash, RequestHash::of(&raw).as_bytes().to_vec());

        let raw = GetSeq { actor: 77 }.encode_to_vec();
        let (_, body) = call(app, post("/pbtx/get_seq", raw)).await;
        assert_eq!(envelope(&body).status(), PbtxStatus::Success);
        assert_eq!(
            metrics
                .gateway
                .responses_total
                .with_label_values(&["register_account", "SUCCESS"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn rejection_still_echoes_hash() {
        let ledger = ledger();
        ledger.insert_seq(NET, 5, SeqRecord::default());
        let (app, _) = app(ledger);
        let raw = Transaction {
            body: TransactionBody {
                network_id: NET,
                actor: 5,
                seqnum: 9,
                prev_hash: 0,
                transaction_type: 0,
                transaction_content: Vec::new(),
            }
            .encode_to_vec(),
            authorities: Vec::new(),
        }
        .encode_to_vec();

        let (status, body) = call(app, post("/pbtx/send_transaction", raw.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let resp = envelope(&body);
        assert_eq!(resp.status(), PbtxStatus::InvalidSeq);
        assert_eq!(resp.request_hash, RequestHash::of(&raw).as_bytes().to_vec());
    }

    #[tokio::test]
    async fn wrong_content_type_is_415() {
        let (app, _) = app(ledger());
        let req = Request::builder()
            .method("POST")
            .uri("/pbtx/get_seq")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .expect("request");
        let (status, _) = call(app, req).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn undecodable_body_is_400() {
        let (app, metrics) = app(ledger());
        let (status, _) = call(app, post("/pbtx/send_transaction", vec![0x0a, 0x10, 0x01])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            metrics
                .gateway
                .internal_errors_total
                .with_label_values(&["send_transaction"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn ledger_outage_on_send_is_500() {
        let ledger = ledger();
        ledger.insert_seq(NET, 5, SeqRecord::default());
        ledger.fail_submissions(Some(ChainError::Timeout("node unreachable".into())));
        let (app, _) = app(ledger);
        let raw = Transaction {
            body: TransactionBody {
                network_id: NET,
                actor: 5,
                seqnum: 1,
                prev_hash: 0,
                transaction_type: 0,
                transaction_content: Vec::new(),
            }
            .encode_to_vec(),
            authorities: Vec::new(),
        }
        .encode_to_vec();
        let (status, _) = call(app, post("/pbtx/send_transaction", raw)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
