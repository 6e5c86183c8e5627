//! Account record and its two wire encodings.
//!
//! The canonical trie encoding always carries all four fields. The slim
//! snapshot encoding replaces a storage root equal to the empty-trie hash
//! and an empty code hash with empty strings, saving 64 bytes per plain
//! account. The two translate losslessly in both directions.

use crate::entities::{Hash, EMPTY_CODE_HASH, EMPTY_TRIE_ROOT};
use crate::rlp::{self, RlpError};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Account state as committed to the account trie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Transaction nonce.
    pub nonce: u64,
    /// Balance in base units.
    pub balance: U256,
    /// Root of the account's storage trie (EMPTY_TRIE_ROOT if no storage).
    pub storage_root: Hash,
    /// Keccak256 of the contract code (EMPTY_CODE_HASH for plain accounts).
    pub code_hash: Hash,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            storage_root: EMPTY_TRIE_ROOT,
            code_hash: EMPTY_CODE_HASH,
        }
    }
}

impl Account {
    /// Plain account with a balance and nothing else.
    pub fn with_balance(balance: u64) -> Self {
        Self {
            balance: U256::from(balance),
            ..Default::default()
        }
    }

    /// True when the account has no storage trie.
    pub fn has_empty_storage(&self) -> bool {
        self.storage_root == EMPTY_TRIE_ROOT
    }

    /// True when the account carries no code.
    pub fn has_empty_code(&self) -> bool {
        self.code_hash == EMPTY_CODE_HASH
    }

    /// Canonical trie encoding: [nonce, balance, storage_root, code_hash].
    pub fn encode_full(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(110);
        rlp::append_u64(&mut payload, self.nonce);
        rlp::append_u256(&mut payload, &self.balance);
        rlp::append_bytes(&mut payload, &self.storage_root);
        rlp::append_bytes(&mut payload, &self.code_hash);
        rlp::wrap_list(payload)
    }

    /// Slim snapshot encoding: empty defaults collapse to empty strings.
    pub fn encode_slim(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(110);
        rlp::append_u64(&mut payload, self.nonce);
        rlp::append_u256(&mut payload, &self.balance);
        if self.has_empty_storage() {
            rlp::append_bytes(&mut payload, &[]);
        } else {
            rlp::append_bytes(&mut payload, &self.storage_root);
        }
        if self.has_empty_code() {
            rlp::append_bytes(&mut payload, &[]);
        } else {
            rlp::append_bytes(&mut payload, &self.code_hash);
        }
        rlp::wrap_list(payload)
    }

    /// Decode the canonical trie encoding.
    pub fn decode_full(data: &[u8]) -> Result<Self, RlpError> {
        let mut reader = rlp::decode_list(data)?;
        let nonce = reader.next_u64()?;
        let balance = reader.next_u256()?;
        let storage_root = read_hash(&mut reader, EMPTY_TRIE_ROOT, false)?;
        let code_hash = read_hash(&mut reader, EMPTY_CODE_HASH, false)?;
        Ok(Self {
            nonce,
            balance,
            storage_root,
            code_hash,
        })
    }

    /// Decode the slim snapshot encoding, restoring empty defaults.
    pub fn decode_slim(data: &[u8]) -> Result<Self, RlpError> {
        let mut reader = rlp::decode_list(data)?;
        let nonce = reader.next_u64()?;
        let balance = reader.next_u256()?;
        let storage_root = read_hash(&mut reader, EMPTY_TRIE_ROOT, true)?;
        let code_hash = read_hash(&mut reader, EMPTY_CODE_HASH, true)?;
        Ok(Self {
            nonce,
            balance,
            storage_root,
            code_hash,
        })
    }
}

/// Translate a slim-encoded account blob into the canonical trie encoding.
pub fn slim_to_full(slim: &[u8]) -> Result<Vec<u8>, RlpError> {
    Ok(Account::decode_slim(slim)?.encode_full())
}

/// Translate a canonical trie account blob into the slim snapshot encoding.
pub fn full_to_slim(full: &[u8]) -> Result<Vec<u8>, RlpError> {
    Ok(Account::decode_full(full)?.encode_slim())
}

fn read_hash(
    reader: &mut rlp::Reader<'_>,
    default: Hash,
    allow_empty: bool,
) -> Result<Hash, RlpError> {
    let payload = reader.next_bytes()?;
    if payload.is_empty() && allow_empty {
        return Ok(default);
    }
    if payload.len() != 32 {
        return Err(RlpError::InvalidLength);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(payload);
    Ok(out)
}
