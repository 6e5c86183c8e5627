//! Core primitives: hashes, well-known constants, hex display helpers.

use sha3::{Digest, Keccak256};

/// 32-byte Keccak256 digest.
pub type Hash = [u8; 32];

/// Accounts and storage slots are addressed by the hash of their key,
/// so snapshot and trie keys share this alias.
pub type KeyHash = Hash;

/// All-zero hash. Used as the `owner` of the account trie and as the
/// "no hash" sentinel.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Keccak256 hash of the empty RLP string.
/// Value: keccak256(0x80) = 0x56e81f...b421
pub const EMPTY_TRIE_ROOT: Hash = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
];

/// Keccak256 hash of empty code.
/// Value: keccak256("") = 0xc5d246...a470
pub const EMPTY_CODE_HASH: Hash = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

/// Compute the Keccak256 hash of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Short hex rendering of a hash for log lines and error messages.
pub fn hex32(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Parse a 32-byte hash from a hex string, with or without `0x` prefix.
pub fn parse_hash(s: &str) -> Option<Hash> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Some(out)
}
