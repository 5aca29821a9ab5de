//! Antelope K1 (secp256k1) keys and signatures.
//!
//! Binary forms follow the ledger's serializer: a leading key-type byte
//! (`0` for K1), then a 33-byte compressed point for public keys, or a
//! compact header byte plus `r || s` for signatures. Text forms are the
//! usual `PUB_K1_`, `PVT_K1_` and `SIG_K1_` base58 strings with RIPEMD-160
//! checksums, plus the legacy `EOS…` public key and WIF private key.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Key-type byte of K1 keys and signatures in binary encodings.
pub const KEY_TYPE_K1: u8 = 0;

const COMPRESSED_POINT_LEN: usize = 33;
const SECRET_LEN: usize = 32;
const COMPACT_SIG_LEN: usize = 65;
const CHECKSUM_LEN: usize = 4;
const WIF_VERSION: u8 = 0x80;
/// 27 + 4: compact-signature header for compressed public keys.
const COMPACT_HEADER_BASE: u8 = 31;
const MAX_SIGN_ATTEMPTS: usize = 64;

/// Errors from parsing or using key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("unsupported key type {0}")]
    UnsupportedType(u8),
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("invalid curve material: {0}")]
    Curve(String),
    #[error("invalid base58: {0}")]
    Base58(String),
    #[error("checksum mismatch")]
    Checksum,
    #[error("unrecognised key format")]
    Format,
    #[error("could not produce a canonical signature")]
    NonCanonical,
}

fn ripemd_checksum(data: &[u8], suffix: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.update(suffix);
    let digest = hasher.finalize();
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

fn double_sha_checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(Sha256::digest(data));
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

fn encode_k1(prefix: &str, payload: &[u8]) -> String {
    let mut buf = payload.to_vec();
    buf.extend_from_slice(&ripemd_checksum(payload, b"K1"));
    format!("{prefix}{}", bs58::encode(buf).into_string())
}

/// Decodes a base58 payload and splits off its 4-byte checksum.
fn decode_checked(encoded: &str, payload_len: usize) -> Result<(Vec<u8>, [u8; CHECKSUM_LEN]), KeyError> {
    let raw = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| KeyError::Base58(e.to_string()))?;
    if raw.len() != payload_len + CHECKSUM_LEN {
        return Err(KeyError::Length {
            expected: payload_len + CHECKSUM_LEN,
            actual: raw.len(),
        });
    }
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&raw[payload_len..]);
    Ok((raw[..payload_len].to_vec(), checksum))
}

fn decode_k1(encoded: &str, payload_len: usize) -> Result<Vec<u8>, KeyError> {
    let (payload, checksum) = decode_checked(encoded, payload_len)?;
    if ripemd_checksum(&payload, b"K1") != checksum {
        return Err(KeyError::Checksum);
    }
    Ok(payload)
}

/// Antelope signature malleability rule, stricter than low-S.
fn is_canonical(rs: &[u8]) -> bool {
    let (r, s) = rs.split_at(32);
    r[0] & 0x80 == 0
        && !(r[0] == 0 && r[1] & 0x80 == 0)
        && s[0] & 0x80 == 0
        && !(s[0] == 0 && s[1] & 0x80 == 0)
}

/// A K1 public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct K1PublicKey(VerifyingKey);

impl K1PublicKey {
    /// Parses the binary form: type byte followed by a compressed point.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, KeyError> {
        let (ty, point) = bytes.split_first().ok_or(KeyError::Length {
            expected: 1 + COMPRESSED_POINT_LEN,
            actual: 0,
        })?;
        if *ty != KEY_TYPE_K1 {
            return Err(KeyError::UnsupportedType(*ty));
        }
        Self::from_compressed(point)
    }

    fn from_compressed(point: &[u8]) -> Result<Self, KeyError> {
        if point.len() != COMPRESSED_POINT_LEN {
            return Err(KeyError::Length {
                expected: COMPRESSED_POINT_LEN,
                actual: point.len(),
            });
        }
        VerifyingKey::from_sec1_bytes(point)
            .map(K1PublicKey)
            .map_err(|e| KeyError::Curve(e.to_string()))
    }

    fn compressed(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + COMPRESSED_POINT_LEN);
        out.push(KEY_TYPE_K1);
        out.extend_from_slice(&self.compressed());
        out
    }

    /// Verifies `sig` as a signature over SHA-256 of `message`.
    pub fn verify_message(&self, message: &[u8], sig: &K1Signature) -> bool {
        let digest: [u8; 32] = Sha256::digest(message).into();
        self.verify_digest(&digest, sig)
    }

    pub fn verify_digest(&self, digest: &[u8; 32], sig: &K1Signature) -> bool {
        let normalized = sig.sig.normalize_s().unwrap_or(sig.sig);
        self.0.verify_prehash(digest, &normalized).is_ok()
    }
}

impl fmt::Display for K1PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_k1("PUB_K1_", &self.compressed()))
    }
}

impl FromStr for K1PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("PUB_K1_") {
            return Self::from_compressed(&decode_k1(rest, COMPRESSED_POINT_LEN)?);
        }
        if let Some(rest) = s.strip_prefix("EOS") {
            let (payload, checksum) = decode_checked(rest, COMPRESSED_POINT_LEN)?;
            if ripemd_checksum(&payload, b"") != checksum {
                return Err(KeyError::Checksum);
            }
            return Self::from_compressed(&payload);
        }
        Err(KeyError::Format)
    }
}

/// A recoverable K1 signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct K1Signature {
    sig: Signature,
    recid: RecoveryId,
}

impl K1Signature {
    fn compact(&self) -> [u8; COMPACT_SIG_LEN] {
        let mut out = [0u8; COMPACT_SIG_LEN];
        out[0] = COMPACT_HEADER_BASE + self.recid.to_byte();
        out[1..].copy_from_slice(&self.sig.to_bytes());
        out
    }

    fn from_compact(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != COMPACT_SIG_LEN {
            return Err(KeyError::Length {
                expected: COMPACT_SIG_LEN,
                actual: bytes.len(),
            });
        }
        let header = bytes[0];
        if !(27..=34).contains(&header) {
            return Err(KeyError::Format);
        }
        let recid = RecoveryId::from_byte((header - 27) & 3).ok_or(KeyError::Format)?;
        let sig = Signature::from_slice(&bytes[1..]).map_err(|e| KeyError::Curve(e.to_string()))?;
        Ok(Self { sig, recid })
    }

    /// Parses the binary form: type byte, header byte, `r || s`.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, KeyError> {
        let (ty, compact) = bytes.split_first().ok_or(KeyError::Length {
            expected: 1 + COMPACT_SIG_LEN,
            actual: 0,
        })?;
        if *ty != KEY_TYPE_K1 {
            return Err(KeyError::UnsupportedType(*ty));
        }
        Self::from_compact(compact)
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + COMPACT_SIG_LEN);
        out.push(KEY_TYPE_K1);
        out.extend_from_slice(&self.compact());
        out
    }
}

impl fmt::Display for K1Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_k1("SIG_K1_", &self.compact()))
    }
}

impl FromStr for K1Signature {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("SIG_K1_").ok_or(KeyError::Format)?;
        Self::from_compact(&decode_k1(rest, COMPACT_SIG_LEN)?)
    }
}

/// A K1 private key. `Debug` never prints key material.
#[derive(Clone)]
pub struct K1PrivateKey(SigningKey);

impl K1PrivateKey {
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != SECRET_LEN {
            return Err(KeyError::Length {
                expected: SECRET_LEN,
                actual: bytes.len(),
            });
        }
        SigningKey::from_slice(bytes)
            .map(K1PrivateKey)
            .map_err(|e| KeyError::Curve(e.to_string()))
    }

    pub fn public_key(&self) -> K1PublicKey {
        K1PublicKey(self.0.verifying_key().clone())
    }

    /// Signs a 32-byte digest, retrying until the result is canonical.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<K1Signature, KeyError> {
        let mut rng = OsRng;
        for _ in 0..MAX_SIGN_ATTEMPTS {
            let sig: Signature = self
                .0
                .sign_prehash_with_rng(&mut rng, digest)
                .map_err(|e| KeyError::Curve(e.to_string()))?;
            let sig = sig.normalize_s().unwrap_or(sig);
            if !is_canonical(&sig.to_bytes()) {
                continue;
            }
            let recid = RecoveryId::trial_recovery_from_prehash(self.0.verifying_key(), digest, &sig)
                .map_err(|e| KeyError::Curve(e.to_string()))?;
            return Ok(K1Signature { sig, recid });
        }
        Err(KeyError::NonCanonical)
    }

    /// Signs SHA-256 of `message`.
    pub fn sign_message(&self, message: &[u8]) -> Result<K1Signature, KeyError> {
        let digest: [u8; 32] = Sha256::digest(message).into();
        self.sign_digest(&digest)
    }
}

impl fmt::Debug for K1PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "K1PrivateKey({} / <redacted>)", self.public_key())
    }
}

impl FromStr for K1PrivateKey {
    type Err = KeyError;

    /// Accepts `PVT_K1_…`, legacy WIF, or 64 hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("PVT_K1_") {
            return Self::from_secret_bytes(&decode_k1(rest, SECRET_LEN)?);
        }
        if s.len() == SECRET_LEN * 2 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            let bytes = hex::decode(s).map_err(|_| KeyError::Format)?;
            return Self::from_secret_bytes(&bytes);
        }
        let (payload, checksum) = decode_checked(s, 1 + SECRET_LEN)?;
        if payload[0] != WIF_VERSION {
            return Err(KeyError::Format);
        }
        if double_sha_checksum(&payload) != checksum {
            return Err(KeyError::Checksum);
        }
        Self::from_secret_bytes(&payload[1..])
    }
}
