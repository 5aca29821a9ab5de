//! Minimal async client for the Antelope chain HTTP API.
//!
//! Only the endpoints the gateway uses are modelled:
//!
//! - `POST /v1/chain/get_info`
//! - `POST /v1/chain/get_account`
//! - `POST /v1/chain/get_abi`
//! - `POST /v1/chain/get_table_rows`
//! - `POST /v1/chain/send_transaction2`
//!
//! Every request goes through one `reqwest::Client` configured with the
//! ledger timeout, so no call can hang indefinitely.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ledger::ChainError;

/// `get_info` response, trimmed to the fields we read.
#[derive(Clone, Debug, Deserialize)]
pub struct ChainInfo {
    pub chain_id: String,
    pub head_block_time: String,
    #[serde(deserialize_with = "u64_from_any")]
    pub last_irreversible_block_num: u64,
    pub last_irreversible_block_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AbiResponse {
    pub account_name: String,
    pub abi: Option<AbiDef>,
}

#[derive(Debug, Deserialize)]
pub struct AbiDef {
    #[serde(default)]
    pub actions: Vec<AbiAction>,
    #[serde(default)]
    pub tables: Vec<AbiTable>,
}

#[derive(Debug, Deserialize)]
pub struct AbiAction {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AbiTable {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TableQuery<'a> {
    pub code: &'a str,
    pub table: &'a str,
    pub scope: String,
    pub json: bool,
    pub key_type: &'static str,
    pub lower_bound: String,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(bound = "R: DeserializeOwned")]
pub struct TableRows<R> {
    pub rows: Vec<R>,
    #[serde(default)]
    pub more: bool,
}

/// Row of the `networks` table.
#[derive(Clone, Debug, Deserialize)]
pub struct NetworkRow {
    #[serde(deserialize_with = "u64_from_any")]
    pub network_id: u64,
    pub admin_acc: String,
}

/// Row of the `actorperm` table; `permission` is hex-encoded bytes.
#[derive(Clone, Debug, Deserialize)]
pub struct ActorPermRow {
    #[serde(deserialize_with = "u64_from_any")]
    pub actor: u64,
    pub permission: String,
}

/// Row of the `actorseq` table.
#[derive(Clone, Debug, Deserialize)]
pub struct ActorSeqRow {
    #[serde(deserialize_with = "u64_from_any")]
    pub actor: u64,
    #[serde(deserialize_with = "u64_from_any")]
    pub seqnum: u64,
    #[serde(deserialize_with = "u64_from_any")]
    pub prev_hash: u64,
}

#[derive(Debug, Serialize)]
pub struct PackedTransaction {
    pub signatures: Vec<String>,
    pub compression: u8,
    pub packed_context_free_data: String,
    pub packed_trx: String,
}

#[derive(Debug, Serialize)]
struct SendTransaction2<'a> {
    return_failure_trace: bool,
    retry_trx: bool,
    transaction: &'a PackedTransaction,
}

#[derive(Debug, Deserialize)]
pub struct SendTransactionResult {
    pub transaction_id: String,
    #[serde(default)]
    pub processed: Value,
}

impl SendTransactionResult {
    /// Exception message if the transaction failed during processing.
    pub fn exception(&self) -> Option<String> {
        let except = self.processed.get("except")?;
        if except.is_null() {
            return None;
        }
        let detail = except
            .get("message")
            .or_else(|| except.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown exception");
        Some(detail.to_string())
    }
}

/// Accepts 64-bit integers encoded as JSON numbers or as strings; nodes
/// quote values above 32 bits.
pub fn u64_from_any<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(u64),
        Str(String),
    }

    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Error document returned by nodes on failure.
#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    message: String,
    error: Option<RpcErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorDetail {
    #[serde(default)]
    name: String,
    #[serde(default)]
    what: String,
    #[serde(default)]
    details: Vec<RpcErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorMessage {
    #[serde(default)]
    message: String,
}

/// Classifies a non-2xx reply. Only a node's own error document is an
/// RPC error; anything else (a proxy page, an empty body) means the node
/// was not reached.
fn status_error(url: &str, status: u16, body: &str) -> ChainError {
    match serde_json::from_str::<RpcErrorBody>(body) {
        Ok(RpcErrorBody {
            error: Some(detail),
            ..
        }) => {
            let first = detail
                .details
                .first()
                .map(|d| d.message.as_str())
                .unwrap_or("");
            ChainError::Rpc {
                status,
                message: format!("{} ({}): {}", detail.what, detail.name, first),
            }
        }
        Ok(parsed) if !parsed.message.is_empty() && status < 500 => ChainError::Rpc {
            status,
            message: parsed.message,
        },
        _ => {
            let snippet: String = body.chars().take(256).collect();
            ChainError::Transport(format!("{url}: HTTP {status}: {snippet}"))
        }
    }
}

/// Thin wrapper around the node's chain API.
#[derive(Clone, Debug)]
pub struct ChainApi {
    base_url: String,
    client: Client,
}

impl ChainApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn call<B, R>(&self, path: &str, body: &B) -> Result<R, ChainError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| classify(&url, e))?;
        if !status.is_success() {
            return Err(status_error(&url, status.as_u16(), &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| ChainError::Protocol(format!("failed to parse response of {url}: {e}")))
    }

    pub async fn get_info(&self) -> Result<ChainInfo, ChainError> {
        self.call("/v1/chain/get_info", &serde_json::json!({})).await
    }

    pub async fn get_account(&self, name: &str) -> Result<Value, ChainError> {
        self.call(
            "/v1/chain/get_account",
            &serde_json::json!({ "account_name": name }),
        )
        .await
    }

    pub async fn get_abi(&self, account: &str) -> Result<AbiResponse, ChainError> {
        self.call(
            "/v1/chain/get_abi",
            &serde_json::json!({ "account_name": account }),
        )
        .await
    }

    pub async fn get_table_rows<R>(&self, query: &TableQuery<'_>) -> Result<TableRows<R>, ChainError>
    where
        R: DeserializeOwned,
    {
        self.call("/v1/chain/get_table_rows", query).await
    }

    pub async fn send_transaction2(
        &self,
        trx: &PackedTransaction,
    ) -> Result<SendTransactionResult, ChainError> {
        let body = SendTransaction2 {
            return_failure_trace: true,
            retry_trx: false,
            transaction: trx,
        };
        self.call("/v1/chain/send_transaction2", &body).await
    }
}

fn classify(url: &str, e: reqwest::Error) -> ChainError {
    if e.is_timeout() {
        ChainError::Timeout(format!("{url}: {e}"))
    } else {
        ChainError::Transport(format!("{url}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_row_accepts_quoted_and_plain_integers() {
        let json = r#"{"actor":"18446744073709551615","seqnum":3,"prev_hash":"12345678901234567890"}"#;
        let row: ActorSeqRow = serde_json::from_str(json).expect("row parses");
        assert_eq!(row.actor, u64::MAX);
        assert_eq!(row.seqnum, 3);
        assert_eq!(row.prev_hash, 12_345_678_901_234_567_890);
    }

    #[test]
    fn table_rows_parse_with_more_flag_absent() {
        let json = r#"{"rows":[{"actor":1001,"permission":"0a0b"}]}"#;
        let rows: TableRows<ActorPermRow> = serde_json::from_str(json).expect("rows parse");
        assert_eq!(rows.rows.len(), 1);
        assert!(!rows.more);
        assert_eq!(rows.rows[0].permission, "0a0b");
    }

    #[test]
    fn processed_exception_is_extracted() {
        let ok: SendTransactionResult =
            serde_json::from_str(r#"{"transaction_id":"ab","processed":{"except":null}}"#)
                .expect("parses");
        assert_eq!(ok.exception(), None);

        let failed: SendTransactionResult = serde_json::from_str(
            r#"{"transaction_id":"cd","processed":{"except":{"name":"eosio_assert_message_exception","message":"assertion failure"}}}"#,
        )
        .expect("parses");
        assert_eq!(failed.exception().as_deref(), Some("assertion failure"));
    }

    #[test]
    fn node_error_document_is_rpc_error() {
        let body = r#"{"code":500,"message":"Internal Service Error","error":{"code":3010001,"name":"name_type_exception","what":"Invalid name","details":[{"message":"Name not properly normalized"}]}}"#;
        match status_error("http://node", 500, body) {
            ChainError::Rpc { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(
                    message,
                    "Invalid name (name_type_exception): Name not properly normalized"
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn proxy_failure_is_transport_error() {
        let err = status_error("http://node", 502, "<html>Bad Gateway</html>");
        assert!(matches!(err, ChainError::Transport(_)));
        assert!(!err.is_rejection());

        let err = status_error("http://node", 503, r#"{"message":"upstream unavailable"}"#);
        assert!(matches!(err, ChainError::Transport(_)));
    }

    #[test]
    fn endpoint_avoids_double_slashes() {
        let api = ChainApi::new("http://node:8888/", Duration::from_secs(1)).expect("client");
        assert_eq!(
            api.endpoint("/v1/chain/get_info"),
            "http://node:8888/v1/chain/get_info"
        );
    }
}
