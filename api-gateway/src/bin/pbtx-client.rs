//! Command-line client for a PBTX gateway.
//!
//! ```text
//! pbtx-client --url http://127.0.0.1:8800/pbtx regacc --actor 1001 --actorkey PVT_K1_...
//! pbtx-client --url http://127.0.0.1:8800/pbtx getseq --actor 1001
//! pbtx-client --url http://127.0.0.1:8800/pbtx sendtrx --actor 1001 --actorkey PVT_K1_... \
//!     --network-id 42 --content 0a0b
//! ```

use anyhow::{Context, bail, ensure};
use clap::{Parser, Subcommand};
use prost::Message;
use sha2::{Digest, Sha256};

use pbtx::{
    AccountSeqData, Authority, GetSeq, K1PrivateKey, KeyType, KeyWeight, Permission, PublicKey,
    RegisterAccount, RequestResponse, StatusCode, Transaction, TransactionBody,
};

#[derive(Parser)]
#[command(name = "pbtx-client", version, about = "PBTX gateway client")]
struct Cli {
    /// Gateway base URL, including the configured URL path.
    #[arg(long)]
    url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register an account, or retrieve its seqnum and prev_hash.
    Regacc {
        #[arg(long)]
        actor: u64,
        /// Actor private key.
        #[arg(long)]
        actorkey: K1PrivateKey,
        /// Credentials, hex-encoded.
        #[arg(long)]
        creds: Option<String>,
    },
    /// Show the actor's last seqnum and prev_hash.
    Getseq {
        #[arg(long)]
        actor: u64,
    },
    /// Sign and submit the actor's next transaction.
    Sendtrx {
        #[arg(long)]
        actor: u64,
        #[arg(long)]
        actorkey: K1PrivateKey,
        #[arg(long)]
        network_id: u64,
        #[arg(long, default_value_t = 0)]
        trx_type: u32,
        /// Transaction content, hex-encoded.
        #[arg(long, default_value = "")]
        content: String,
    },
}

struct GatewayClient {
    base: String,
    http: reqwest::Client,
}

impl GatewayClient {
    fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Posts `body` and checks that the response echoes its digest.
    async fn call(&self, path: &str, body: Vec<u8>) -> anyhow::Result<RequestResponse> {
        let expected: [u8; 32] = Sha256::digest(&body).into();
        let url = format!("{}{path}", self.base);
        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = resp.status();
        let bytes = resp.bytes().await.context("reading response body")?;
        if !status.is_success() {
            bail!("{url} answered {status}: {}", String::from_utf8_lossy(&bytes));
        }

        let decoded = RequestResponse::decode(bytes).context("decoding response envelope")?;
        ensure!(
            decoded.request_hash == expected,
            "request_hash mismatch: response does not belong to this request"
        );
        Ok(decoded)
    }
}

fn print_response(resp: &RequestResponse, with_seq: bool) -> anyhow::Result<()> {
    let status = StatusCode::try_from(resp.status)
        .map(|s| s.name().to_string())
        .unwrap_or_else(|_| format!("UNKNOWN({})", resp.status));
    let mut doc = serde_json::json!({
        "request_hash": hex::encode(&resp.request_hash),
        "status": status,
    });
    if with_seq {
        let data = AccountSeqData::decode(resp.data.as_slice()).context("decoding seq data")?;
        doc["network_id"] = data.network_id.into();
        doc["last_seqnum"] = data.last_seqnum.into();
        doc["prev_hash"] = data.prev_hash.to_string().into();
    }
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = GatewayClient::new(&cli.url);

    match cli.command {
        Command::Regacc {
            actor,
            actorkey,
            creds,
        } => {
            let permission_bytes = Permission {
                actor,
                threshold: 1,
                keys: vec![KeyWeight {
                    key: Some(PublicKey {
                        r#type: KeyType::EosioKey as i32,
                        key_bytes: actorkey.public_key().to_wire(),
                    }),
                    weight: 1,
                }],
            }
            .encode_to_vec();
            let signature = actorkey.sign_message(&permission_bytes)?.to_wire();
            let credentials = creds
                .map(|c| hex::decode(c).context("--creds must be hex"))
                .transpose()?;

            let req = RegisterAccount {
                permission_bytes,
                signature,
                credentials,
            };
            let resp = client
                .call("/register_account", req.encode_to_vec())
                .await?;
            print_response(&resp, true)
        }
        Command::Getseq { actor } => {
            let resp = client
                .call("/get_seq", GetSeq { actor }.encode_to_vec())
                .await?;
            print_response(&resp, true)
        }
        Command::Sendtrx {
            actor,
            actorkey,
            network_id,
            trx_type,
            content,
        } => {
            let resp = client
                .call("/get_seq", GetSeq { actor }.encode_to_vec())
                .await?;
            ensure!(
                resp.status() == StatusCode::Success,
                "cannot fetch sequence of actor {actor}: {}",
                resp.status()
            );
            let seq = AccountSeqData::decode(resp.data.as_slice()).context("decoding seq data")?;
            let seqnum = seq
                .last_seqnum
                .checked_add(1)
                .context("sequence number exhausted")?;

            let body = TransactionBody {
                network_id,
                actor,
                seqnum,
                prev_hash: seq.prev_hash,
                transaction_type: trx_type,
                transaction_content: hex::decode(&content).context("--content must be hex")?,
            }
            .encode_to_vec();
            let sig = actorkey.sign_message(&body)?.to_wire();
            let trx = Transaction {
                body,
                authorities: vec![Authority {
                    r#type: KeyType::EosioKey as i32,
                    sigs: vec![sig],
                }],
            };

            let resp = client
                .call("/send_transaction", trx.encode_to_vec())
                .await?;
            print_response(&resp, false)
        }
    }
}
