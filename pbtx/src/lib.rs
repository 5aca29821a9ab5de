//! PBTX gateway library crate.
//!
//! This crate provides the building blocks of a gateway that admits
//! off-chain actors and their transactions onto an Antelope ledger:
//!
//! - strongly-typed protobuf messages and domain values (`types`),
//! - K1 keys, signatures and permission verification (`crypto`),
//! - ledger access behind a trait, with Antelope and in-memory backends (`ledger`),
//! - the request state machines (`sequencer`) and response envelopes (`response`),
//! - start-up precondition checks (`startup`),
//! - Prometheus-based metrics (`metrics`),
//! - and environment-driven configuration (`config`).
//!
//! The HTTP transport lives in the `api-gateway` crate, which composes these
//! pieces.

pub mod config;
pub mod crypto;
pub mod ledger;
pub mod metrics;
pub mod response;
pub mod sequencer;
pub mod startup;
pub mod types;

pub use config::{GatewayConfig, LedgerConfig, MetricsConfig, load_dotenv};

pub use crypto::{
    K1PrivateKey, K1PublicKey, K1Signature, KeyError, PermissionError, Verification,
    verify_permission,
};

pub use ledger::{AntelopeLedger, ChainError, InMemoryLedger, Ledger, NetworkConfig, TxId};

pub use sequencer::{Outcome, Sequencer, SequencerError};
pub use response::{build_response, encode_response};
pub use startup::{StartupError, verify_preconditions};

pub use metrics::{GatewayMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;
