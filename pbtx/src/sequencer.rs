//! Request sequencing: the decision logic behind the three endpoints.
//!
//! The [`Sequencer`] holds no state of its own. Every decision re-reads the
//! actor's permission and sequence record from the [`Ledger`], and every
//! accepted request ends in exactly one ledger submission (or none, for
//! reads and rejections).
//!
//! Validation rejections come back as an [`Outcome`] carrying a
//! [`StatusCode`]. Only malformed input, corrupted ledger state and ledger
//! failures outside the registration flow are returned as
//! [`SequencerError`].

use std::sync::Arc;

use prost::Message;
use thiserror::Error;

use crate::crypto::{PermissionError, verify_permission};
use crate::ledger::{ChainError, Ledger};
use crate::types::{
    AccountSeqData, GetSeq, RegisterAccount, SeqRecord, StatusCode, Transaction, TransactionBody,
};

/// Failures that do not map to a response status.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("cannot decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: prost::DecodeError,
    },
    #[error(transparent)]
    Permission(#[from] PermissionError),
    /// The ledger holds a permission for the actor but no sequence record.
    #[error("ledger state is inconsistent for actor {actor}: permission without sequence record")]
    CorruptedState { actor: u64 },
    #[error(transparent)]
    Ledger(#[from] ChainError),
}

impl SequencerError {
    /// Whether the caller sent something unusable, as opposed to the
    /// gateway or the ledger failing.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            SequencerError::Decode { .. } | SequencerError::Permission(_)
        )
    }
}

fn decode<M: Message + Default>(what: &'static str, bytes: &[u8]) -> Result<M, SequencerError> {
    M::decode(bytes).map_err(|source| SequencerError::Decode { what, source })
}

/// Status plus the optional sequence payload of a response.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Outcome {
    pub status: StatusCode,
    pub data: Option<AccountSeqData>,
}

impl Outcome {
    fn bare(status: StatusCode) -> Self {
        Self { status, data: None }
    }

    fn with_seq(status: StatusCode, network_id: u64, record: SeqRecord) -> Self {
        Self {
            status,
            data: Some(AccountSeqData {
                network_id,
                last_seqnum: record.seqnum,
                prev_hash: record.prev_hash,
            }),
        }
    }
}

/// Validates requests and relays accepted ones to the ledger.
#[derive(Clone)]
pub struct Sequencer {
    network_id: u64,
    ledger: Arc<dyn Ledger>,
}

impl Sequencer {
    pub fn new(network_id: u64, ledger: Arc<dyn Ledger>) -> Self {
        Self { network_id, ledger }
    }

    pub fn network_id(&self) -> u64 {
        self.network_id
    }

    /// Registers the actor named inside the permission, or confirms an
    /// identical earlier registration.
    pub async fn register_account(&self, raw: &[u8]) -> Result<Outcome, SequencerError> {
        let req: RegisterAccount = decode("RegisterAccount", raw)?;
        let network_id = self.network_id;
        let defaults = Outcome::with_seq(StatusCode::Success, network_id, SeqRecord::default());
        tracing::info!(
            permission = %hex::encode(&req.permission_bytes),
            signature = %hex::encode(&req.signature),
            credentials = ?req.credentials.as_ref().map(hex::encode),
            "registration request"
        );

        let verification = verify_permission(&req.permission_bytes, &req.signature)?;
        let actor = verification.actor();
        if !verification.is_verified() {
            tracing::info!(actor, "registration rejected: signature does not verify");
            return Ok(Outcome {
                status: StatusCode::InvalidSignature,
                ..defaults
            });
        }
        tracing::info!(actor, ?verification, "permission signature verified");

        let existing = match self.ledger.lookup_permission(network_id, actor).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::error!(actor, network_id, error = %e, "permission lookup failed");
                return Ok(Outcome {
                    status: StatusCode::InfrastructureError,
                    ..defaults
                });
            }
        };

        tracing::info!(
            actor,
            network_id,
            found = existing.is_some(),
            identical = existing.as_deref() == Some(req.permission_bytes.as_slice()),
            "permission lookup"
        );

        match existing {
            Some(stored) if stored == req.permission_bytes => {
                let record = match self.ledger.lookup_seq(network_id, actor).await {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        tracing::error!(actor, network_id, "permission registered but sequence record missing");
                        return Err(SequencerError::CorruptedState { actor });
                    }
                    Err(e) => {
                        tracing::error!(actor, network_id, error = %e, "sequence lookup failed");
                        return Ok(Outcome {
                            status: StatusCode::InfrastructureError,
                            ..defaults
                        });
                    }
                };
                tracing::info!(
                    actor,
                    network_id,
                    seqnum = record.seqnum,
                    prev_hash = record.prev_hash,
                    "actor already registered with identical permission"
                );
                Ok(Outcome::with_seq(StatusCode::Success, network_id, record))
            }
            Some(_) => {
                tracing::info!(actor, network_id, "registration rejected: actor exists with a different permission");
                Ok(Outcome {
                    status: StatusCode::DuplicateActor,
                    ..defaults
                })
            }
            None => match self.ledger.submit_register(network_id, &req.permission_bytes).await {
                Ok(tx_id) => {
                    tracing::info!(actor, network_id, %tx_id, "actor registered");
                    Ok(defaults)
                }
                Err(e) => {
                    tracing::error!(actor, network_id, error = %e, "registration submission failed");
                    Ok(Outcome {
                        status: StatusCode::InfrastructureError,
                        ..defaults
                    })
                }
            },
        }
    }

    /// Reports the actor's current sequence record.
    pub async fn get_seq(&self, raw: &[u8]) -> Result<Outcome, SequencerError> {
        let req: GetSeq = decode("GetSeq", raw)?;
        let network_id = self.network_id;
        tracing::info!(actor = req.actor, network_id, "sequence query");

        match self.ledger.lookup_seq(network_id, req.actor).await? {
            Some(record) => {
                tracing::info!(
                    actor = req.actor,
                    seqnum = record.seqnum,
                    prev_hash = record.prev_hash,
                    "sequence record found"
                );
                Ok(Outcome::with_seq(StatusCode::Success, network_id, record))
            }
            None => {
                tracing::info!(actor = req.actor, network_id, "unknown actor");
                Ok(Outcome::with_seq(
                    StatusCode::InvalidActor,
                    network_id,
                    SeqRecord::default(),
                ))
            }
        }
    }

    /// Validates a transaction's network and position in the actor's chain,
    /// then relays `raw` unchanged.
    pub async fn send_transaction(&self, raw: &[u8]) -> Result<Outcome, SequencerError> {
        let trx: Transaction = decode("Transaction", raw)?;
        let body: TransactionBody = decode("TransactionBody", &trx.body)?;
        let actor = body.actor;
        tracing::info!(
            actor,
            network_id = body.network_id,
            seqnum = body.seqnum,
            prev_hash = body.prev_hash,
            transaction_type = body.transaction_type,
            content_len = body.transaction_content.len(),
            authorities = trx.authorities.len(),
            signatures = trx.authorities.iter().map(|a| a.sigs.len()).sum::<usize>(),
            "transaction request"
        );

        if body.network_id != self.network_id {
            tracing::info!(
                actor,
                network_id = body.network_id,
                expected = self.network_id,
                "transaction rejected: wrong network"
            );
            return Ok(Outcome::bare(StatusCode::InvalidNetworkId));
        }

        let Some(record) = self.ledger.lookup_seq(self.network_id, actor).await? else {
            tracing::info!(actor, "transaction rejected: unknown actor");
            return Ok(Outcome::bare(StatusCode::InvalidActor));
        };

        if !record.admits(&body) {
            tracing::info!(
                actor,
                seqnum = body.seqnum,
                prev_hash = body.prev_hash,
                last_seqnum = record.seqnum,
                last_prev_hash = record.prev_hash,
                "transaction rejected: out of sequence"
            );
            return Ok(Outcome::bare(StatusCode::InvalidSeq));
        }
        tracing::info!(
            actor,
            last_seqnum = record.seqnum,
            last_prev_hash = record.prev_hash,
            "sequence record admits transaction"
        );

        match self.ledger.submit_transaction(raw).await {
            Ok(tx_id) => {
                tracing::info!(actor, seqnum = body.seqnum, %tx_id, "transaction relayed");
                Ok(Outcome::bare(StatusCode::Success))
            }
            Err(e) if e.is_rejection() => {
                tracing::info!(actor, seqnum = body.seqnum, error = %e, "ledger refused transaction");
                Ok(Outcome::bare(StatusCode::InvalidContent))
            }
            Err(e) => {
                tracing::error!(actor, seqnum = body.seqnum, error = %e, "transaction submission failed");
                Err(e.into())
            }
        }
    }
}
