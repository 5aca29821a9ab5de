//! Permission signature verification.
//!
//! A registration request carries the encoded permission and a signature
//! over those exact bytes. Verification scans the declared keys in order
//! and stops at the first key under which the signature verifies.
//!
//! The declared `threshold` and key weights are not consulted: one valid
//! signature from any listed key satisfies the permission. Clients in the
//! field rely on that behaviour, so it is kept as-is.

use prost::Message;
use thiserror::Error;

use super::keys::{K1PublicKey, K1Signature, KeyError};
use crate::types::{KeyType, Permission};

/// Hard failures: the permission itself cannot be trusted.
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("malformed permission: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("permission for actor {actor} declares unsupported key type {key_type}")]
    UnsupportedKeyType { actor: u64, key_type: i32 },
    #[error("permission for actor {actor} has a key entry without a key")]
    MissingKey { actor: u64 },
    #[error("permission for actor {actor} has a malformed key at index {index}: {source}")]
    BadKey {
        actor: u64,
        index: usize,
        #[source]
        source: KeyError,
    },
}

/// Result of checking a signature against a permission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    /// The signature verifies under the key at `key_index`.
    Verified { actor: u64, key_index: usize },
    /// No listed key verifies the signature, or the signature is unreadable.
    Rejected { actor: u64 },
}

impl Verification {
    pub fn actor(&self) -> u64 {
        match self {
            Verification::Verified { actor, .. } | Verification::Rejected { actor } => *actor,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified { .. })
    }
}

/// Verifies `signature` over `permission_bytes` against the keys declared
/// inside those same bytes.
///
/// An entry of any type other than the supported one fails the whole
/// check, wherever it appears in the list. A signature that cannot be
/// parsed is treated as not verifying.
pub fn verify_permission(
    permission_bytes: &[u8],
    signature: &[u8],
) -> Result<Verification, PermissionError> {
    let perm = Permission::decode(permission_bytes)?;
    let actor = perm.actor;
    tracing::info!(
        actor,
        threshold = perm.threshold,
        keys = ?perm
            .keys
            .iter()
            .map(|kw| (
                kw.key.as_ref().map(|k| (k.r#type, hex::encode(&k.key_bytes))),
                kw.weight
            ))
            .collect::<Vec<_>>(),
        "permission decoded"
    );

    for kw in &perm.keys {
        let key = kw.key.as_ref().ok_or(PermissionError::MissingKey { actor })?;
        if KeyType::try_from(key.r#type) != Ok(KeyType::EosioKey) {
            return Err(PermissionError::UnsupportedKeyType {
                actor,
                key_type: key.r#type,
            });
        }
    }

    let sig = match K1Signature::from_wire(signature) {
        Ok(sig) => sig,
        Err(e) => {
            tracing::debug!(actor, error = %e, "unreadable signature");
            return Ok(Verification::Rejected { actor });
        }
    };

    for (index, kw) in perm.keys.iter().enumerate() {
        let Some(key) = kw.key.as_ref() else {
            continue;
        };
        let pubkey = K1PublicKey::from_wire(&key.key_bytes).map_err(|source| {
            PermissionError::BadKey {
                actor,
                index,
                source,
            }
        })?;
        if pubkey.verify_message(permission_bytes, &sig) {
            return Ok(Verification::Verified {
                actor,
                key_index: index,
            });
        }
    }

    Ok(Verification::Rejected { actor })
}
