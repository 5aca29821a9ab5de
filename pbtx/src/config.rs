//! Gateway configuration.
//!
//! This module aggregates configuration for:
//!
//! - the ledger connection and signing accounts (`LedgerConfig`),
//! - the metrics exporter (`MetricsConfig`),
//! - the network the gateway serves (`GatewayConfig::network_id`).
//!
//! Each struct is a `clap::Args` group: every option can be given as a
//! command-line flag or through its environment variable (optionally seeded
//! from a `.env` file). Binaries flatten `GatewayConfig` into their own
//! parser; the result is built once at start-up and passed by reference.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Args;

use crate::crypto::K1PrivateKey;

/// Loads `.env` into the process environment if present. Values already
/// set in the environment win.
pub fn load_dotenv() {
    if let Ok(path) = dotenv::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env file");
    }
}

fn parse_secs(raw: &str) -> Result<Duration, std::num::ParseIntError> {
    raw.parse().map(Duration::from_secs)
}

fn parse_chain_id(raw: &str) -> Result<String, String> {
    let id = raw.trim().to_ascii_lowercase();
    match hex::decode(&id) {
        Ok(bytes) if bytes.len() == 32 => Ok(id),
        _ => Err("expected 64 hex characters".to_string()),
    }
}

/// Ledger endpoint, contract and signing accounts.
///
/// The private keys are redacted from `Debug` output and are only handed
/// to the ledger implementation.
#[derive(Clone, Debug, Args)]
pub struct LedgerConfig {
    /// Base URL of the node's HTTP API, e.g. `"http://127.0.0.1:8888"`.
    #[arg(long = "antelope-rpc-url", env = "ANTELOPE_RPC_URL")]
    pub rpc_url: String,
    /// Expected chain id, hex-encoded.
    #[arg(long = "antelope-chainid", env = "ANTELOPE_CHAINID", value_parser = parse_chain_id)]
    pub chain_id: String,
    /// Account holding the PBTX contract.
    #[arg(long = "antelope-contract", env = "ANTELOPE_CONTRACT")]
    pub contract: String,
    /// Network admin account, signs registrations.
    #[arg(long = "antelope-admin", env = "ANTELOPE_ADMIN")]
    pub admin: String,
    #[arg(long = "antelope-admin-pk", env = "ANTELOPE_ADMIN_PK", hide_env_values = true)]
    pub admin_key: K1PrivateKey,
    /// Worker account, signs relayed transactions.
    #[arg(long = "antelope-worker", env = "ANTELOPE_WORKER")]
    pub worker: String,
    #[arg(long = "antelope-worker-pk", env = "ANTELOPE_WORKER_PK", hide_env_values = true)]
    pub worker_key: K1PrivateKey,
    /// Bound on every ledger call, in seconds.
    #[arg(
        long = "antelope-timeout-secs",
        env = "ANTELOPE_TIMEOUT_SECS",
        value_parser = parse_secs,
        default_value = "10"
    )]
    pub timeout: Duration,
    /// How far past the head block time submitted transactions expire, in seconds.
    #[arg(
        long = "antelope-trx-expire-secs",
        env = "ANTELOPE_TRX_EXPIRE_SECS",
        value_parser = parse_secs,
        default_value = "120"
    )]
    pub trx_expiration: Duration,
}

impl LedgerConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_TRX_EXPIRATION: Duration = Duration::from_secs(120);
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug, Default, Args)]
pub struct MetricsConfig {
    /// Address of the `/metrics` exporter; disabled when unset.
    #[arg(long = "metrics-addr", env = "METRICS_ADDR")]
    pub listen_addr: Option<SocketAddr>,
}

/// Top-level library configuration.
#[derive(Clone, Debug, Args)]
pub struct GatewayConfig {
    /// Network whose actors this gateway serves.
    #[arg(long = "network-id", env = "NETWORK_ID")]
    pub network_id: u64,
    #[command(flatten)]
    pub ledger: LedgerConfig,
    #[command(flatten)]
    pub metrics: MetricsConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::{CommandFactory, Parser};

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        gateway: GatewayConfig,
    }

    const ADMIN_WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";

    fn base() -> Vec<String> {
        let chain_id = "AB".repeat(32);
        let worker_pk = "22".repeat(32);
        [
            "gateway",
            "--network-id",
            "42",
            "--antelope-rpc-url",
            "http://127.0.0.1:8888",
            "--antelope-chainid",
            chain_id.as_str(),
            "--antelope-contract",
            "pbtx",
            "--antelope-admin",
            "pbtxadmin",
            "--antelope-admin-pk",
            ADMIN_WIF,
            "--antelope-worker",
            "pbtxworker",
            "--antelope-worker-pk",
            worker_pk.as_str(),
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn parse(args: Vec<String>) -> Result<GatewayConfig, clap::Error> {
        TestCli::try_parse_from(args).map(|cli| cli.gateway)
    }

    fn without(flag: &str) -> Vec<String> {
        let mut args = base();
        let at = args.iter().position(|a| a == flag).expect("flag present");
        args.drain(at..at + 2);
        args
    }

    #[test]
    fn command_definition_is_consistent() {
        TestCli::command().debug_assert();
    }

    #[test]
    fn every_option_has_its_environment_variable() {
        let cmd = TestCli::command();
        let envs: Vec<_> = cmd
            .get_arguments()
            .filter_map(|a| a.get_env())
            .map(|e| e.to_string_lossy().into_owned())
            .collect();
        for name in [
            "NETWORK_ID",
            "ANTELOPE_RPC_URL",
            "ANTELOPE_CHAINID",
            "ANTELOPE_CONTRACT",
            "ANTELOPE_ADMIN",
            "ANTELOPE_ADMIN_PK",
            "ANTELOPE_WORKER",
            "ANTELOPE_WORKER_PK",
            "ANTELOPE_TIMEOUT_SECS",
            "ANTELOPE_TRX_EXPIRE_SECS",
            "METRICS_ADDR",
        ] {
            assert!(envs.iter().any(|e| e == name), "{name} not bound");
        }
    }

    #[test]
    fn full_config_parses_with_defaults() {
        let cfg = parse(base()).expect("config parses");
        assert_eq!(cfg.network_id, 42);
        assert_eq!(cfg.ledger.chain_id, "ab".repeat(32));
        assert_eq!(cfg.ledger.timeout, LedgerConfig::DEFAULT_TIMEOUT);
        assert_eq!(cfg.ledger.trx_expiration, LedgerConfig::DEFAULT_TRX_EXPIRATION);
        assert!(cfg.metrics.listen_addr.is_none());
    }

    #[test]
    fn missing_option_is_named() {
        let err = parse(without("--antelope-worker")).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.to_string().contains("--antelope-worker"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut args = without("--network-id");
        args.extend(["--network-id".into(), "forty-two".into()]);
        let err = parse(args).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("--network-id"));

        let mut args = without("--antelope-admin-pk");
        args.extend(["--antelope-admin-pk".into(), "PVT_K1_garbage".into()]);
        let err = parse(args).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ValueValidation);

        let mut args = without("--antelope-chainid");
        args.extend(["--antelope-chainid".into(), "abcd".into()]);
        let err = parse(args).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn debug_output_hides_private_keys() {
        let cfg = parse(base()).expect("config parses");
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains(ADMIN_WIF));
        assert!(!dbg.contains(&"22".repeat(32)));
    }

    #[test]
    fn optional_overrides_apply() {
        let mut args = base();
        args.extend(
            ["--antelope-timeout-secs", "3", "--metrics-addr", "127.0.0.1:9898"].map(String::from),
        );
        let cfg = parse(args).expect("config parses");
        assert_eq!(cfg.ledger.timeout, Duration::from_secs(3));
        assert_eq!(
            cfg.metrics.listen_addr,
            Some("127.0.0.1:9898".parse().expect("addr"))
        );
    }
}
