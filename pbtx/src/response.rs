//! Response envelope construction.

use prost::Message;

use crate::sequencer::Outcome;
use crate::types::{RequestHash, RequestResponse};

/// Builds the envelope for `outcome`, echoing the hash of the request body.
pub fn build_response(hash: &RequestHash, outcome: &Outcome) -> RequestResponse {
    RequestResponse {
        request_hash: hash.as_bytes().to_vec(),
        status: outcome.status as i32,
        data: outcome
            .data
            .map(|d| d.encode_to_vec())
            .unwrap_or_default(),
    }
}

/// Encodes the envelope for `outcome` as the HTTP response body.
pub fn encode_response(hash: &RequestHash, outcome: &Outcome) -> Vec<u8> {
    build_response(hash, outcome).encode_to_vec()
}
