//! Antelope binary serialization for the few types the gateway packs.
//!
//! Only what is needed to build `regactor` and `exectrx` transactions is
//! implemented: account names, unsigned LEB128 lengths, byte vectors and
//! the transaction layout itself.

use sha2::{Digest, Sha256};

use crate::ledger::ChainError;

/// An Antelope account or action name packed into 64 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Name(pub u64);

impl Name {
    const MAX_LEN: usize = 13;

    pub fn parse(s: &str) -> Result<Self, ChainError> {
        if s.len() > Self::MAX_LEN {
            return Err(ChainError::Build(format!("name too long: {s:?}")));
        }
        let bytes = s.as_bytes();
        let mut value: u64 = 0;
        for i in 0..Self::MAX_LEN {
            let c = match bytes.get(i) {
                Some(b) => symbol(*b).ok_or_else(|| {
                    ChainError::Build(format!("invalid character in name {s:?}"))
                })?,
                None => 0,
            };
            if i < 12 {
                value |= (c & 0x1f) << (64 - 5 * (i + 1));
            } else {
                if c > 0x0f {
                    return Err(ChainError::Build(format!("invalid 13th character in {s:?}")));
                }
                value |= c;
            }
        }
        Ok(Name(value))
    }
}

fn symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some(u64::from(c - b'a') + 6),
        b'1'..=b'5' => Some(u64::from(c - b'1') + 1),
        b'.' => Some(0),
        _ => None,
    }
}

/// Append-only binary writer.
#[derive(Default)]
pub struct Packer {
    buf: Vec<u8>,
}

impl Packer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn name(&mut self, n: Name) -> &mut Self {
        self.u64(n.0)
    }

    pub fn varuint32(&mut self, mut v: u32) -> &mut Self {
        loop {
            let mut b = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                b |= 0x80;
            }
            self.buf.push(b);
            if v == 0 {
                return self;
            }
        }
    }

    pub fn bytes(&mut self, data: &[u8]) -> Result<&mut Self, ChainError> {
        let len = u32::try_from(data.len())
            .map_err(|_| ChainError::Build(format!("byte field too large: {}", data.len())))?;
        self.varuint32(len);
        self.buf.extend_from_slice(data);
        Ok(self)
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// `actor@permission` authorization of an action.
#[derive(Clone, Copy, Debug)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

/// A contract action with pre-packed data.
#[derive(Clone, Debug)]
pub struct Action {
    pub account: Name,
    pub name: Name,
    pub authorization: Vec<PermissionLevel>,
    pub data: Vec<u8>,
}

/// TaPoS fields and expiration of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionHeader {
    pub expiration: u32,
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
}

/// Packs a transaction with no context-free actions or extensions.
pub fn pack_transaction(
    header: &TransactionHeader,
    actions: &[Action],
) -> Result<Vec<u8>, ChainError> {
    let mut p = Packer::new();
    p.u32(header.expiration)
        .u16(header.ref_block_num)
        .u32(header.ref_block_prefix)
        .varuint32(0) // max_net_usage_words
        .u8(0) // max_cpu_usage_ms
        .varuint32(0) // delay_sec
        .varuint32(0); // context_free_actions

    p.varuint32(count(actions.len())?);
    for action in actions {
        p.name(action.account).name(action.name);
        p.varuint32(count(action.authorization.len())?);
        for level in &action.authorization {
            p.name(level.actor).name(level.permission);
        }
        p.bytes(&action.data)?;
    }

    p.varuint32(0); // transaction_extensions
    Ok(p.finish())
}

fn count(n: usize) -> Result<u32, ChainError> {
    u32::try_from(n).map_err(|_| ChainError::Build(format!("too many elements: {n}")))
}

/// Digest the transaction signatures cover.
///
/// `chain_id || packed_trx || sha256(context_free_data)`, where empty
/// context-free data hashes to 32 zero bytes.
pub fn signing_digest(chain_id: &[u8; 32], packed_trx: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(chain_id);
    hasher.update(packed_trx);
    hasher.update([0u8; 32]);
    hasher.finalize().into()
}

/// Data of the contract's `regactor` action.
pub fn regactor_data(network_id: u64, permission_bytes: &[u8]) -> Result<Vec<u8>, ChainError> {
    let mut p = Packer::new();
    p.u64(network_id).bytes(permission_bytes)?;
    Ok(p.finish())
}

/// Data of the contract's `exectrx` action.
pub fn exectrx_data(worker: Name, trx_input: &[u8]) -> Result<Vec<u8>, ChainError> {
    let mut p = Packer::new();
    p.name(worker).bytes(trx_input)?;
    Ok(p.finish())
}
