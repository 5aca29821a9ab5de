//! In-memory ledger.
//!
//! Mirrors what the ledger contract does with `regactor` and `exectrx`
//! closely enough for tests and local runs: it keeps permissions and
//! sequence records per network, and it enforces the ordering invariant
//! itself, so it can act as the final arbiter the gateway defers to.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use prost::Message;

use crate::ledger::{ChainError, Ledger, NetworkConfig, TxId};
use crate::types::{SeqRecord, Transaction, TransactionBody, body_chain_hash};

#[derive(Default)]
struct State {
    accounts: HashSet<String>,
    networks: HashMap<u64, NetworkConfig>,
    permissions: HashMap<(u64, u64), Vec<u8>>,
    seqs: HashMap<(u64, u64), SeqRecord>,
    submissions: usize,
    next_tx: u64,
    fail_submissions: Option<ChainError>,
}

impl State {
    fn next_tx_id(&mut self) -> TxId {
        self.next_tx += 1;
        TxId(format!("{:064x}", self.next_tx))
    }
}

/// Ledger state held in process memory.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
}

fn clone_error(e: &ChainError) -> ChainError {
    match e {
        ChainError::Transport(m) => ChainError::Transport(m.clone()),
        ChainError::Timeout(m) => ChainError::Timeout(m.clone()),
        ChainError::Rpc { status, message } => ChainError::Rpc {
            status: *status,
            message: message.clone(),
        },
        ChainError::Rejected(m) => ChainError::Rejected(m.clone()),
        ChainError::Protocol(m) => ChainError::Protocol(m.clone()),
        ChainError::Build(m) => ChainError::Build(m.clone()),
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates accounts and a network administered by `admin`.
    pub fn with_network(self, network_id: u64, contract: &str, admin: &str, worker: &str) -> Self {
        {
            let mut st = self.state();
            for account in [contract, admin, worker] {
                st.accounts.insert(account.to_string());
            }
            st.networks.insert(
                network_id,
                NetworkConfig {
                    network_id,
                    admin_account: admin.to_string(),
                },
            );
        }
        self
    }

    pub fn add_account(&self, name: &str) {
        self.state().accounts.insert(name.to_string());
    }

    /// Writes a permission row without a matching sequence row.
    pub fn insert_permission(&self, network_id: u64, actor: u64, permission_bytes: Vec<u8>) {
        self.state()
            .permissions
            .insert((network_id, actor), permission_bytes);
    }

    pub fn insert_seq(&self, network_id: u64, actor: u64, record: SeqRecord) {
        self.state().seqs.insert((network_id, actor), record);
    }

    /// Makes every following submission fail with `error`, or succeed
    /// again when `None`.
    pub fn fail_submissions(&self, error: Option<ChainError>) {
        self.state().fail_submissions = error;
    }

    /// Number of submissions that reached the ledger, successful or not.
    pub fn submission_count(&self) -> usize {
        self.state().submissions
    }

    pub fn seq(&self, network_id: u64, actor: u64) -> Option<SeqRecord> {
        self.state().seqs.get(&(network_id, actor)).copied()
    }

    pub fn permission(&self, network_id: u64, actor: u64) -> Option<Vec<u8>> {
        self.state().permissions.get(&(network_id, actor)).cloned()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn get_network_config(
        &self,
        network_id: u64,
    ) -> Result<Option<NetworkConfig>, ChainError> {
        Ok(self.state().networks.get(&network_id).cloned())
    }

    async fn account_exists(&self, name: &str) -> Result<bool, ChainError> {
        Ok(self.state().accounts.contains(name))
    }

    async fn lookup_permission(
        &self,
        network_id: u64,
        actor: u64,
    ) -> Result<Option<Vec<u8>>, ChainError> {
        Ok(self.permission(network_id, actor))
    }

    async fn lookup_seq(
        &self,
        network_id: u64,
        actor: u64,
    ) -> Result<Option<SeqRecord>, ChainError> {
        Ok(self.seq(network_id, actor))
    }

    async fn submit_register(
        &self,
        network_id: u64,
        permission_bytes: &[u8],
    ) -> Result<TxId, ChainError> {
        let mut st = self.state();
        st.submissions += 1;
        if let Some(e) = &st.fail_submissions {
            return Err(clone_error(e));
        }
        if !st.networks.contains_key(&network_id) {
            return Err(ChainError::Rejected(format!("unknown network {network_id}")));
        }

        let perm = crate::types::Permission::decode(permission_bytes)
            .map_err(|e| ChainError::Rejected(format!("cannot decode permission: {e}")))?;
        let key = (network_id, perm.actor);
        if st.permissions.contains_key(&key) {
            return Err(ChainError::Rejected(format!(
                "actor {} already exists",
                perm.actor
            )));
        }

        st.permissions.insert(key, permission_bytes.to_vec());
        st.seqs.insert(key, SeqRecord::default());
        Ok(st.next_tx_id())
    }

    async fn submit_transaction(&self, raw_transaction: &[u8]) -> Result<TxId, ChainError> {
        let mut st = self.state();
        st.submissions += 1;
        if let Some(e) = &st.fail_submissions {
            return Err(clone_error(e));
        }

        let trx = Transaction::decode(raw_transaction)
            .map_err(|e| ChainError::Rejected(format!("cannot decode transaction: {e}")))?;
        let body = TransactionBody::decode(trx.body.as_slice())
            .map_err(|e| ChainError::Rejected(format!("cannot decode body: {e}")))?;
        let key = (body.network_id, body.actor);

        let record = *st
            .seqs
            .get(&key)
            .ok_or_else(|| ChainError::Rejected(format!("unknown actor {}", body.actor)))?;
        if !record.admits(&body) {
            return Err(ChainError::Rejected(format!(
                "out of order: seqnum {} prev_hash {} against record {:?}",
                body.seqnum, body.prev_hash, record
            )));
        }

        st.seqs.insert(
            key,
            SeqRecord {
                seqnum: body.seqnum,
                prev_hash: body_chain_hash(&trx.body),
            },
        );
        Ok(st.next_tx_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Permission;

    fn perm_bytes(actor: u64) -> Vec<u8> {
        Permission {
            actor,
            threshold: 1,
            keys: Vec::new(),
        }
        .encode_to_vec()
    }

    fn trx_bytes(actor: u64, seqnum: u32, prev_hash: u64) -> (Vec<u8>, Vec<u8>) {
        let body = TransactionBody {
            network_id: 1,
            actor,
            seqnum,
            prev_hash,
            transaction_type: 0,
            transaction_content: Vec::new(),
        }
        .encode_to_vec();
        let trx = Transaction {
            body: body.clone(),
            authorities: Vec::new(),
        }
        .encode_to_vec();
        (body, trx)
    }

    #[tokio::test]
    async fn register_creates_zero_cursor() {
        let ledger = InMemoryLedger::new().with_network(1, "pbtx", "admin", "worker");
        ledger.submit_register(1, &perm_bytes(5)).await.expect("register");

        assert_eq!(ledger.seq(1, 5), Some(SeqRecord::default()));
        assert_eq!(ledger.permission(1, 5), Some(perm_bytes(5)));
        assert!(ledger.submit_register(1, &perm_bytes(5)).await.is_err());
    }

    #[tokio::test]
    async fn exectrx_advances_and_chains() {
        let ledger = InMemoryLedger::new().with_network(1, "pbtx", "admin", "worker");
        ledger.insert_seq(1, 5, SeqRecord::default());

        let (body, trx) = trx_bytes(5, 1, 0);
        ledger.submit_transaction(&trx).await.expect("first accepted");
        assert_eq!(
            ledger.seq(1, 5),
            Some(SeqRecord {
                seqnum: 1,
                prev_hash: body_chain_hash(&body)
            })
        );

        let err = ledger.submit_transaction(&trx).await.expect_err("replay refused");
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn failing_mode_counts_submissions() {
        let ledger = InMemoryLedger::new().with_network(1, "pbtx", "admin", "worker");
        ledger.fail_submissions(Some(ChainError::Timeout("slow".into())));

        let err = ledger.submit_register(1, &perm_bytes(5)).await.expect_err("fails");
        assert!(matches!(err, ChainError::Timeout(_)));
        assert_eq!(ledger.submission_count(), 1);
        assert_eq!(ledger.permission(1, 5), None);
    }
}
