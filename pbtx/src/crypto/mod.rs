//! Key handling and permission verification.

pub mod keys;
pub mod permission;

pub use keys::{K1PrivateKey, K1PublicKey, K1Signature, KeyError};
pub use permission::{PermissionError, Verification, verify_permission};
