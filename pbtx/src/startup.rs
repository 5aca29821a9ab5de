//! Start-up preconditions.
//!
//! The gateway must not serve traffic unless the configured accounts exist
//! and the configured network is registered with the configured admin.

use thiserror::Error;

use crate::config::GatewayConfig;
use crate::ledger::{ChainError, Ledger};

/// Fatal start-up failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Ledger(#[from] ChainError),
    #[error("chain id reported by the node is {actual}, expected {expected}")]
    ChainIdMismatch { expected: String, actual: String },
    #[error("contract {contract} ABI lacks {missing}")]
    ContractAbi { contract: String, missing: String },
    #[error("invalid account specified for {role}: {account}")]
    MissingAccount { role: &'static str, account: String },
    #[error("no such network id: {0}")]
    UnknownNetwork(u64),
    #[error("network id {network_id} defines admin {registered}, but {configured} is configured")]
    AdminMismatch {
        network_id: u64,
        registered: String,
        configured: String,
    },
}

/// Checks every precondition against the ledger, in order, stopping at the
/// first failure.
pub async fn verify_preconditions(
    ledger: &dyn Ledger,
    cfg: &GatewayConfig,
) -> Result<(), StartupError> {
    let accounts = [
        ("contract", &cfg.ledger.contract),
        ("admin", &cfg.ledger.admin),
        ("worker", &cfg.ledger.worker),
    ];
    for (role, account) in accounts {
        if !ledger.account_exists(account).await? {
            return Err(StartupError::MissingAccount {
                role,
                account: account.clone(),
            });
        }
    }

    let network = ledger
        .get_network_config(cfg.network_id)
        .await?
        .ok_or(StartupError::UnknownNetwork(cfg.network_id))?;
    if network.admin_account != cfg.ledger.admin {
        return Err(StartupError::AdminMismatch {
            network_id: cfg.network_id,
            registered: network.admin_account,
            configured: cfg.ledger.admin.clone(),
        });
    }

    tracing::info!(
        network_id = cfg.network_id,
        contract = %cfg.ledger.contract,
        admin = %cfg.ledger.admin,
        worker = %cfg.ledger.worker,
        "start-up preconditions satisfied"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LedgerConfig, MetricsConfig};
    use crate::ledger::InMemoryLedger;
    use std::time::Duration;

    fn cfg(network_id: u64) -> GatewayConfig {
        GatewayConfig {
            network_id,
            ledger: LedgerConfig {
                rpc_url: "http://127.0.0.1:8888".to_string(),
                chain_id: "00".repeat(32),
                contract: "pbtx".to_string(),
                admin: "pbtxadmin".to_string(),
                admin_key: "11".repeat(32).parse().expect("key"),
                worker: "pbtxworker".to_string(),
                worker_key: "22".repeat(32).parse().expect("key"),
                timeout: Duration::from_secs(1),
                trx_expiration: Duration::from_secs(120),
            },
            metrics: MetricsConfig::default(),
        }
    }

    #[tokio::test]
    async fn passes_when_everything_matches() {
        let ledger = InMemoryLedger::new().with_network(5, "pbtx", "pbtxadmin", "pbtxworker");
        verify_preconditions(&ledger, &cfg(5)).await.expect("preconditions hold");
    }

    #[tokio::test]
    async fn unknown_network_is_fatal() {
        let ledger = InMemoryLedger::new().with_network(5, "pbtx", "pbtxadmin", "pbtxworker");
        let err = verify_preconditions(&ledger, &cfg(6)).await.expect_err("fatal");
        assert!(matches!(err, StartupError::UnknownNetwork(6)));
    }

    #[tokio::test]
    async fn admin_mismatch_is_fatal() {
        let ledger = InMemoryLedger::new().with_network(5, "pbtx", "otheradmin", "pbtxworker");
        ledger.add_account("pbtxadmin");
        let err = verify_preconditions(&ledger, &cfg(5)).await.expect_err("fatal");
        assert!(matches!(err, StartupError::AdminMismatch { .. }));
    }

    #[tokio::test]
    async fn missing_worker_account_is_fatal() {
        let ledger = InMemoryLedger::new().with_network(5, "pbtx", "pbtxadmin", "someone");
        let err = verify_preconditions(&ledger, &cfg(5)).await.expect_err("fatal");
        assert!(matches!(
            err,
            StartupError::MissingAccount { role: "worker", .. }
        ));
    }
}
