//! Access to the external ledger.
//!
//! [`Ledger`] is the only channel through which the gateway observes or
//! changes ledger state. Two implementations are provided:
//!
//! - [`antelope::AntelopeLedger`], talking to an Antelope node over its
//!   chain HTTP API, and
//! - [`mem::InMemoryLedger`], an in-process stand-in for tests and local
//!   development.
//!
//! Signing keys live inside the implementations; callers never see them.

pub mod antelope;
pub mod mem;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::SeqRecord;

pub use antelope::AntelopeLedger;
pub use mem::InMemoryLedger;

/// Network row as registered on the ledger contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network_id: u64,
    pub admin_account: String,
}

/// Identifier of a submitted ledger transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxId(pub String);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors returned by ledger calls.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The request never got an answer (connection, TLS, body read).
    #[error("ledger transport error: {0}")]
    Transport(String),
    /// The call exceeded its time bound.
    #[error("ledger call timed out: {0}")]
    Timeout(String),
    /// The node answered with an error document.
    #[error("ledger RPC error {status}: {message}")]
    Rpc { status: u16, message: String },
    /// The node processed the transaction and it failed.
    #[error("ledger rejected transaction: {0}")]
    Rejected(String),
    /// The node answered with something we cannot interpret.
    #[error("unexpected ledger response: {0}")]
    Protocol(String),
    /// The transaction could not be built or signed locally.
    #[error("failed to build ledger transaction: {0}")]
    Build(String),
}

impl ChainError {
    /// Whether the ledger itself refused the operation, as opposed to the
    /// call failing before a verdict was returned.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ChainError::Rpc { .. } | ChainError::Rejected(_))
    }

    /// Reclassifies a failure that happened before anything was handed to
    /// the ledger, so it can never read as a verdict on the submission.
    pub fn before_submission(self) -> ChainError {
        match self {
            ChainError::Rpc { status, message } => {
                ChainError::Transport(format!("not submitted, node answered {status}: {message}"))
            }
            ChainError::Rejected(message) => {
                ChainError::Transport(format!("not submitted: {message}"))
            }
            other => other,
        }
    }
}

/// Read and submit operations against the ledger contract.
///
/// All calls are scoped by network where the underlying tables are.
/// Implementations must bound every call in time.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Fetches the network row, or `None` if the network is not registered.
    async fn get_network_config(&self, network_id: u64)
    -> Result<Option<NetworkConfig>, ChainError>;

    async fn account_exists(&self, name: &str) -> Result<bool, ChainError>;

    /// Registered permission bytes of `actor`, exactly as submitted.
    async fn lookup_permission(
        &self,
        network_id: u64,
        actor: u64,
    ) -> Result<Option<Vec<u8>>, ChainError>;

    async fn lookup_seq(&self, network_id: u64, actor: u64)
    -> Result<Option<SeqRecord>, ChainError>;

    /// Registers a new actor, signed with the network admin's key.
    async fn submit_register(
        &self,
        network_id: u64,
        permission_bytes: &[u8],
    ) -> Result<TxId, ChainError>;

    /// Relays a client transaction verbatim, signed with the worker's key.
    async fn submit_transaction(&self, raw_transaction: &[u8]) -> Result<TxId, ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ledger_verdicts_are_rejections() {
        assert!(ChainError::Rejected("assertion failure".into()).is_rejection());
        assert!(
            ChainError::Rpc {
                status: 500,
                message: "tx_cpu_usage_exceeded".into()
            }
            .is_rejection()
        );
        assert!(!ChainError::Timeout("slow".into()).is_rejection());
        assert!(!ChainError::Protocol("garbage".into()).is_rejection());
    }

    #[test]
    fn failures_before_submission_are_not_rejections() {
        let err = ChainError::Rpc {
            status: 500,
            message: "database busy".into(),
        }
        .before_submission();
        assert!(matches!(err, ChainError::Transport(_)));
        assert!(!err.is_rejection());

        let err = ChainError::Timeout("slow".into()).before_submission();
        assert!(matches!(err, ChainError::Timeout(_)));
    }
}
