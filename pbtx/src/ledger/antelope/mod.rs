//! [`Ledger`] implementation backed by an Antelope node.
//!
//! Reads go through `get_table_rows` on the contract's `networks`,
//! `actorperm` and `actorseq` tables. Writes are single-action
//! transactions (`regactor` by the admin account, `exectrx` by the worker
//! account) built, signed and pushed with `send_transaction2`.

pub mod rpc;
pub mod serializer;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;

use crate::config::LedgerConfig;
use crate::crypto::K1PrivateKey;
use crate::ledger::{ChainError, Ledger, NetworkConfig, TxId};
use crate::startup::StartupError;
use crate::types::SeqRecord;

use rpc::{ActorPermRow, ActorSeqRow, ChainApi, NetworkRow, PackedTransaction, TableQuery};
use serializer::{Action, Name, PermissionLevel, TransactionHeader};

const NETWORKS_TABLE: &str = "networks";
const ACTORPERM_TABLE: &str = "actorperm";
const ACTORSEQ_TABLE: &str = "actorseq";
const REGACTOR_ACTION: &str = "regactor";
const EXECTRX_ACTION: &str = "exectrx";
const HEAD_BLOCK_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// An account together with the key used to sign on its behalf.
struct Signer {
    account: Name,
    key: K1PrivateKey,
}

pub struct AntelopeLedger {
    api: ChainApi,
    chain_id: [u8; 32],
    contract_account: String,
    contract: Name,
    active: Name,
    admin: Signer,
    worker: Signer,
    trx_expiration: Duration,
}

impl std::fmt::Debug for AntelopeLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntelopeLedger")
            .field("chain_id", &hex::encode(self.chain_id))
            .field("contract", &self.contract_account)
            .finish_non_exhaustive()
    }
}

impl AntelopeLedger {
    /// Builds the client without touching the network.
    pub fn new(cfg: &LedgerConfig) -> Result<Self, ChainError> {
        let chain_id_bytes = hex::decode(&cfg.chain_id)
            .map_err(|e| ChainError::Build(format!("chain id is not hex: {e}")))?;
        let chain_id: [u8; 32] = chain_id_bytes
            .try_into()
            .map_err(|_| ChainError::Build("chain id must be 32 bytes".to_string()))?;

        Ok(Self {
            api: ChainApi::new(cfg.rpc_url.clone(), cfg.timeout)?,
            chain_id,
            contract_account: cfg.contract.clone(),
            contract: Name::parse(&cfg.contract)?,
            active: Name::parse("active")?,
            admin: Signer {
                account: Name::parse(&cfg.admin)?,
                key: cfg.admin_key.clone(),
            },
            worker: Signer {
                account: Name::parse(&cfg.worker)?,
                key: cfg.worker_key.clone(),
            },
            trx_expiration: cfg.trx_expiration,
        })
    }

    /// Builds the client and checks it is talking to the expected chain
    /// and contract.
    pub async fn connect(cfg: &LedgerConfig) -> Result<Self, StartupError> {
        let ledger = Self::new(cfg)?;

        let info = ledger.api.get_info().await?;
        if !info.chain_id.eq_ignore_ascii_case(&cfg.chain_id) {
            return Err(StartupError::ChainIdMismatch {
                expected: cfg.chain_id.clone(),
                actual: info.chain_id,
            });
        }
        tracing::info!(rpc_url = %cfg.rpc_url, chain_id = %info.chain_id, "connected to ledger");

        let abi = ledger
            .api
            .get_abi(&cfg.contract)
            .await?
            .abi
            .ok_or_else(|| StartupError::ContractAbi {
                contract: cfg.contract.clone(),
                missing: "abi".to_string(),
            })?;
        for action in [REGACTOR_ACTION, EXECTRX_ACTION] {
            if !abi.actions.iter().any(|a| a.name == action) {
                return Err(StartupError::ContractAbi {
                    contract: cfg.contract.clone(),
                    missing: format!("action {action}"),
                });
            }
        }
        for table in [NETWORKS_TABLE, ACTORPERM_TABLE, ACTORSEQ_TABLE] {
            if !abi.tables.iter().any(|t| t.name == table) {
                return Err(StartupError::ContractAbi {
                    contract: cfg.contract.clone(),
                    missing: format!("table {table}"),
                });
            }
        }

        Ok(ledger)
    }

    async fn transaction_header(&self) -> Result<TransactionHeader, ChainError> {
        let info = self.api.get_info().await?;
        tapos_header(
            &info.head_block_time,
            info.last_irreversible_block_num,
            &info.last_irreversible_block_id,
            self.trx_expiration,
        )
    }

    async fn push_action(
        &self,
        signer: &Signer,
        name: &str,
        data: Vec<u8>,
    ) -> Result<TxId, ChainError> {
        let action = Action {
            account: self.contract,
            name: Name::parse(name)?,
            authorization: vec![PermissionLevel {
                actor: signer.account,
                permission: self.active,
            }],
            data,
        };

        let header = self
            .transaction_header()
            .await
            .map_err(ChainError::before_submission)?;
        let packed = serializer::pack_transaction(&header, &[action])?;
        let digest = serializer::signing_digest(&self.chain_id, &packed);
        let signature = signer
            .key
            .sign_digest(&digest)
            .map_err(|e| ChainError::Build(format!("signing failed: {e}")))?;

        let trx = PackedTransaction {
            signatures: vec![signature.to_string()],
            compression: 0,
            packed_context_free_data: String::new(),
            packed_trx: hex::encode(&packed),
        };

        let result = self.api.send_transaction2(&trx).await?;
        if let Some(except) = result.exception() {
            tracing::error!(
                action = name,
                tx_id = %result.transaction_id,
                processed = %result.processed,
                "ledger transaction failed"
            );
            return Err(ChainError::Rejected(except));
        }
        Ok(TxId(result.transaction_id))
    }

    /// Looks up the row stored under exactly `key`.
    ///
    /// The API returns the first row at or after `lower_bound`, so the key
    /// of that row must be compared before it is trusted.
    async fn find_row<R>(
        &self,
        table: &str,
        scope: u64,
        key: u64,
        key_of: impl Fn(&R) -> u64,
    ) -> Result<Option<R>, ChainError>
    where
        R: DeserializeOwned,
    {
        let query = TableQuery {
            code: &self.contract_account,
            table,
            scope: scope.to_string(),
            json: true,
            key_type: "i64",
            lower_bound: key.to_string(),
            limit: 1,
        };
        let rows = self.api.get_table_rows::<R>(&query).await?;
        Ok(rows.rows.into_iter().next().filter(|row| key_of(row) == key))
    }
}

/// Computes expiration and TaPoS reference from chain info.
fn tapos_header(
    head_block_time: &str,
    lib_num: u64,
    lib_id: &str,
    expire_in: Duration,
) -> Result<TransactionHeader, ChainError> {
    let head = NaiveDateTime::parse_from_str(head_block_time, HEAD_BLOCK_TIME_FORMAT)
        .map_err(|e| ChainError::Protocol(format!("bad head_block_time {head_block_time:?}: {e}")))?;
    let expire_secs = i64::try_from(expire_in.as_secs())
        .map_err(|_| ChainError::Build("expiration too large".to_string()))?;
    let expiration = u32::try_from(head.and_utc().timestamp() + expire_secs)
        .map_err(|_| ChainError::Build("expiration out of range".to_string()))?;

    let id = hex::decode(lib_id)
        .map_err(|e| ChainError::Protocol(format!("bad block id {lib_id:?}: {e}")))?;
    if id.len() < 12 {
        return Err(ChainError::Protocol(format!("block id too short: {lib_id:?}")));
    }
    let mut prefix = [0u8; 4];
    prefix.copy_from_slice(&id[8..12]);

    Ok(TransactionHeader {
        expiration,
        ref_block_num: (lib_num & 0xffff) as u16,
        ref_block_prefix: u32::from_le_bytes(prefix),
    })
}

#[async_trait]
impl Ledger for AntelopeLedger {
    async fn get_network_config(
        &self,
        network_id: u64,
    ) -> Result<Option<NetworkConfig>, ChainError> {
        let row: Option<NetworkRow> = self
            .find_row(NETWORKS_TABLE, 0, network_id, |r: &NetworkRow| r.network_id)
            .await?;
        Ok(row.map(|r| NetworkConfig {
            network_id: r.network_id,
            admin_account: r.admin_acc,
        }))
    }

    async fn account_exists(&self, name: &str) -> Result<bool, ChainError> {
        match self.api.get_account(name).await {
            Ok(_) => Ok(true),
            Err(ChainError::Rpc { status, message }) => {
                tracing::debug!(account = name, status, %message, "account lookup refused");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn lookup_permission(
        &self,
        network_id: u64,
        actor: u64,
    ) -> Result<Option<Vec<u8>>, ChainError> {
        let row: Option<ActorPermRow> = self
            .find_row(ACTORPERM_TABLE, network_id, actor, |r: &ActorPermRow| r.actor)
            .await?;
        row.map(|r| {
            hex::decode(&r.permission)
                .map_err(|e| ChainError::Protocol(format!("actorperm row is not hex: {e}")))
        })
        .transpose()
    }

    async fn lookup_seq(
        &self,
        network_id: u64,
        actor: u64,
    ) -> Result<Option<SeqRecord>, ChainError> {
        let row: Option<ActorSeqRow> = self
            .find_row(ACTORSEQ_TABLE, network_id, actor, |r: &ActorSeqRow| r.actor)
            .await?;
        row.map(|r| {
            let seqnum = u32::try_from(r.seqnum).map_err(|_| {
                ChainError::Protocol(format!("actorseq seqnum out of range: {}", r.seqnum))
            })?;
            Ok(SeqRecord {
                seqnum,
                prev_hash: r.prev_hash,
            })
        })
        .transpose()
    }

    async fn submit_register(
        &self,
        network_id: u64,
        permission_bytes: &[u8],
    ) -> Result<TxId, ChainError> {
        let data = serializer::regactor_data(network_id, permission_bytes)?;
        self.push_action(&self.admin, REGACTOR_ACTION, data).await
    }

    async fn submit_transaction(&self, raw_transaction: &[u8]) -> Result<TxId, ChainError> {
        let data = serializer::exectrx_data(self.worker.account, raw_transaction)?;
        self.push_action(&self.worker, EXECTRX_ACTION, data).await
    }
}
