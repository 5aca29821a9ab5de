//! Ledger-level protobuf messages: permissions and transactions.
//!
//! These are the structures clients serialize and sign. The gateway never
//! re-encodes them on the submission path; it keeps the exact bytes it
//! received and only decodes them to read fields.

use prost::Message;
use sha2::{Digest, Sha256};

/// Supported key algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum KeyType {
    /// Antelope-style secp256k1 (K1) key.
    EosioKey = 0,
}

/// A public key tagged with its algorithm.
#[derive(Clone, PartialEq, Message)]
pub struct PublicKey {
    #[prost(enumeration = "KeyType", tag = "1")]
    pub r#type: i32,
    /// Binary key encoding, see [`crate::crypto::K1PublicKey::from_wire`].
    #[prost(bytes = "vec", tag = "2")]
    pub key_bytes: Vec<u8>,
}

/// One key's contribution to a [`Permission`].
#[derive(Clone, PartialEq, Message)]
pub struct KeyWeight {
    #[prost(message, optional, tag = "1")]
    pub key: Option<PublicKey>,
    #[prost(uint32, tag = "2")]
    pub weight: u32,
}

/// Threshold multi-key authorization bound to an actor.
#[derive(Clone, PartialEq, Message)]
pub struct Permission {
    #[prost(fixed64, tag = "1")]
    pub actor: u64,
    /// Declared threshold. Currently not enforced by the gateway: a single
    /// valid signature from any listed key is accepted.
    #[prost(uint32, tag = "2")]
    pub threshold: u32,
    #[prost(message, repeated, tag = "3")]
    pub keys: Vec<KeyWeight>,
}

/// Payload of one ordered operation.
#[derive(Clone, PartialEq, Message)]
pub struct TransactionBody {
    #[prost(fixed64, tag = "1")]
    pub network_id: u64,
    #[prost(fixed64, tag = "2")]
    pub actor: u64,
    #[prost(uint32, tag = "3")]
    pub seqnum: u32,
    #[prost(fixed64, tag = "4")]
    pub prev_hash: u64,
    #[prost(uint32, tag = "5")]
    pub transaction_type: u32,
    #[prost(bytes = "vec", tag = "6")]
    pub transaction_content: Vec<u8>,
}

/// Signatures made with keys of one algorithm.
#[derive(Clone, PartialEq, Message)]
pub struct Authority {
    #[prost(enumeration = "KeyType", tag = "1")]
    pub r#type: i32,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub sigs: Vec<Vec<u8>>,
}

/// Signed envelope around an encoded [`TransactionBody`].
#[derive(Clone, PartialEq, Message)]
pub struct Transaction {
    #[prost(bytes = "vec", tag = "1")]
    pub body: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub authorities: Vec<Authority>,
}

/// Chain-link value the ledger records after accepting a transaction body.
///
/// It is the first 8 bytes (little-endian) of SHA-256 over the encoded
/// body. The next transaction of the same actor must carry this value as
/// its `prev_hash`.
pub fn body_chain_hash(body_bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(body_bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(prefix)
}
