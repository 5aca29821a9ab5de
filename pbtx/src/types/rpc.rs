//! Gateway request and response messages.

use prost::Message;

/// Registration, or idempotent lookup of an already registered actor.
#[derive(Clone, PartialEq, Message)]
pub struct RegisterAccount {
    /// Encoded [`super::Permission`]; the signature covers exactly these bytes.
    #[prost(bytes = "vec", tag = "1")]
    pub permission_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub credentials: Option<Vec<u8>>,
}

/// Query for an actor's current sequence cursor.
#[derive(Clone, PartialEq, Message)]
pub struct GetSeq {
    #[prost(fixed64, tag = "1")]
    pub actor: u64,
}

/// Sequence cursor payload carried in [`RequestResponse::data`].
#[derive(Clone, Copy, PartialEq, Message)]
pub struct AccountSeqData {
    #[prost(fixed64, tag = "1")]
    pub network_id: u64,
    #[prost(uint32, tag = "2")]
    pub last_seqnum: u32,
    #[prost(fixed64, tag = "3")]
    pub prev_hash: u64,
}

/// Outcome of a gateway request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum StatusCode {
    Success = 0,
    InvalidSignature = 1,
    DuplicateActor = 2,
    InvalidActor = 3,
    InvalidNetworkId = 4,
    InvalidSeq = 5,
    InvalidContent = 6,
    InfrastructureError = 7,
}

impl StatusCode {
    /// Stable upper-case name, used in logs and metric labels.
    pub fn name(self) -> &'static str {
        match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::InvalidSignature => "INVALID_SIGNATURE",
            StatusCode::DuplicateActor => "DUPLICATE_ACTOR",
            StatusCode::InvalidActor => "INVALID_ACTOR",
            StatusCode::InvalidNetworkId => "INVALID_NETWORK_ID",
            StatusCode::InvalidSeq => "INVALID_SEQ",
            StatusCode::InvalidContent => "INVALID_CONTENT",
            StatusCode::InfrastructureError => "INFRASTRUCTURE_ERROR",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Response envelope returned for every request kind.
#[derive(Clone, PartialEq, Message)]
pub struct RequestResponse {
    /// SHA-256 of the exact request body received.
    #[prost(bytes = "vec", tag = "1")]
    pub request_hash: Vec<u8>,
    #[prost(enumeration = "StatusCode", tag = "2")]
    pub status: i32,
    /// Status-specific payload; an encoded [`AccountSeqData`] for
    /// registration and sequence queries, empty otherwise.
    #[prost(bytes = "vec", tag = "3")]
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_presence_is_explicit() {
        let without = RegisterAccount {
            permission_bytes: vec![1, 2, 3],
            signature: vec![4, 5],
            credentials: None,
        };
        let with = RegisterAccount {
            credentials: Some(Vec::new()),
            ..without.clone()
        };

        let decoded_without =
            RegisterAccount::decode(without.encode_to_vec().as_slice()).expect("decode");
        let decoded_with = RegisterAccount::decode(with.encode_to_vec().as_slice()).expect("decode");

        assert_eq!(decoded_without.credentials, None);
        assert_eq!(decoded_with.credentials, Some(Vec::new()));
    }

    #[test]
    fn status_names_match_wire_taxonomy() {
        assert_eq!(StatusCode::Success.name(), "SUCCESS");
        assert_eq!(StatusCode::InvalidSeq.to_string(), "INVALID_SEQ");
        assert_eq!(StatusCode::try_from(7), Ok(StatusCode::InfrastructureError));
    }
}
