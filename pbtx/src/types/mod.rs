//! Wire types shared by the gateway.
//!
//! This module defines the protobuf messages exchanged with clients
//! (`messages`, `rpc`), the request-correlation digest, and the small
//! domain values the sequencer reasons about. Raw byte buffers only
//! appear where the protocol demands byte-exact forwarding.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Permission and transaction messages signed by clients.
pub mod messages;
/// Request and response envelopes of the gateway endpoints.
pub mod rpc;

pub use messages::{
    Authority, KeyType, KeyWeight, Permission, PublicKey, Transaction, TransactionBody,
    body_chain_hash,
};
pub use rpc::{AccountSeqData, GetSeq, RegisterAccount, RequestResponse, StatusCode};

/// Length in bytes of a [`RequestHash`].
pub const REQUEST_HASH_LEN: usize = 32;

/// SHA-256 digest of a raw request body.
///
/// Computed before any decoding and echoed in every response so the caller
/// can detect mismatched or corrupted exchanges.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RequestHash(pub [u8; REQUEST_HASH_LEN]);

impl RequestHash {
    /// Digests the exact bytes received on the wire.
    pub fn of(body: &[u8]) -> Self {
        RequestHash(Sha256::digest(body).into())
    }

    pub fn as_bytes(&self) -> &[u8; REQUEST_HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// The three request kinds served by the gateway.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RequestKind {
    RegisterAccount,
    GetSeq,
    SendTransaction,
}

impl RequestKind {
    pub const ALL: [RequestKind; 3] = [
        RequestKind::RegisterAccount,
        RequestKind::GetSeq,
        RequestKind::SendTransaction,
    ];

    /// Endpoint suffix appended to the configured URL prefix.
    pub fn path(self) -> &'static str {
        match self {
            RequestKind::RegisterAccount => "/register_account",
            RequestKind::GetSeq => "/get_seq",
            RequestKind::SendTransaction => "/send_transaction",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RequestKind::RegisterAccount => "register_account",
            RequestKind::GetSeq => "get_seq",
            RequestKind::SendTransaction => "send_transaction",
        }
    }
}

/// Ledger-resident ordering cursor of one actor within one network.
///
/// The gateway only ever observes this value; the ledger advances it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SeqRecord {
    pub seqnum: u32,
    pub prev_hash: u64,
}

impl SeqRecord {
    /// Whether `body` is the immediate successor of this record.
    ///
    /// Both the sequence number and the chain link must match; a correct
    /// seqnum with a stale `prev_hash` is still out of order.
    pub fn admits(&self, body: &TransactionBody) -> bool {
        match self.seqnum.checked_add(1) {
            Some(next) => body.seqnum == next && body.prev_hash == self.prev_hash,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(seqnum: u32, prev_hash: u64) -> TransactionBody {
        TransactionBody {
            network_id: 1,
            actor: 1001,
            seqnum,
            prev_hash,
            transaction_type: 0,
            transaction_content: Vec::new(),
        }
    }

    #[test]
    fn request_hash_is_sha256_of_body() {
        let h = RequestHash::of(b"abc");
        assert_eq!(
            h.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn record_admits_only_exact_successor() {
        let record = SeqRecord {
            seqnum: 4,
            prev_hash: 77,
        };

        assert!(record.admits(&body(5, 77)));
        assert!(!record.admits(&body(5, 78)));
        assert!(!record.admits(&body(4, 77)));
        assert!(!record.admits(&body(6, 77)));
    }

    #[test]
    fn record_at_max_seqnum_admits_nothing() {
        let record = SeqRecord {
            seqnum: u32::MAX,
            prev_hash: 0,
        };
        assert!(!record.admits(&body(0, 0)));
        assert!(!record.admits(&body(u32::MAX, 0)));
    }

    #[test]
    fn request_paths_are_distinct() {
        let mut paths: Vec<_> = RequestKind::ALL.iter().map(|k| k.path()).collect();
        paths.dedup();
        assert_eq!(paths.len(), 3);
    }
}
