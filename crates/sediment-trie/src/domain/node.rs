//! Trie node model: the node kinds, their RLP codec, and node references.

use super::nibbles::Nibbles;
use sediment_types::{keccak256, rlp, Hash, EMPTY_TRIE_ROOT, ZERO_HASH};

// =============================================================================
// NODE REFERENCE
// =============================================================================

/// Identity of one stored trie node: which trie it belongs to (`owner`),
/// where it sits (`path`), and what it commits to (`hash`).
///
/// `owner` is the zero hash for the account trie, otherwise the hash of the
/// account owning the storage trie. The stored blob's Keccak256 digest must
/// equal `hash`; the raw verifier checks this, everything else assumes it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub owner: Hash,
    pub path: Nibbles,
    pub hash: Hash,
}

impl NodeRef {
    pub fn account_trie(path: Nibbles, hash: Hash) -> Self {
        Self {
            owner: ZERO_HASH,
            path,
            hash,
        }
    }

    pub fn storage_trie(owner: Hash, path: Nibbles, hash: Hash) -> Self {
        Self { owner, path, hash }
    }

    /// True for account-trie nodes.
    pub fn is_account_trie(&self) -> bool {
        self.owner == ZERO_HASH
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "owner=0x{} path={} hash=0x{}",
            hex::encode(self.owner),
            self.path,
            hex::encode(self.hash)
        )
    }
}

// =============================================================================
// TRIE NODE
// =============================================================================

/// Node kinds in the Patricia trie.
///
/// Children are always referenced by their 32-byte hash; sub-32-byte node
/// embedding is deliberately not modeled, every node is an addressable blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrieNode {
    /// Leaf node: remaining key path and the value.
    /// RLP: [hex_prefix(path, leaf=true), value]
    Leaf { path: Nibbles, value: Vec<u8> },

    /// Extension node: shared prefix pointing at a single child.
    /// RLP: [hex_prefix(path, leaf=false), child_hash]
    Extension { path: Nibbles, child: Hash },

    /// Branch node: 16-way fan-out.
    /// RLP: [child_0, ..., child_15, value] with empty strings for absent
    /// children. Keys are fixed-width here so the value slot is always empty.
    Branch { children: Box<[Option<Hash>; 16]> },
}

impl TrieNode {
    /// RLP-encode this node for storage and hashing.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            TrieNode::Leaf { path, value } => {
                let mut payload = Vec::with_capacity(path.len() / 2 + value.len() + 8);
                rlp::append_bytes(&mut payload, &path.encode_hex_prefix(true));
                rlp::append_bytes(&mut payload, value);
                rlp::wrap_list(payload)
            }
            TrieNode::Extension { path, child } => {
                let mut payload = Vec::with_capacity(path.len() / 2 + 40);
                rlp::append_bytes(&mut payload, &path.encode_hex_prefix(false));
                rlp::append_bytes(&mut payload, child);
                rlp::wrap_list(payload)
            }
            TrieNode::Branch { children } => {
                let mut payload = Vec::with_capacity(17 * 33);
                for child in children.iter() {
                    match child {
                        Some(hash) => rlp::append_bytes(&mut payload, hash),
                        None => rlp::append_bytes(&mut payload, &[]),
                    }
                }
                rlp::append_bytes(&mut payload, &[]);
                rlp::wrap_list(payload)
            }
        }
    }

    /// Decode a stored node blob.
    pub fn decode(blob: &[u8]) -> Result<Self, super::errors::TrieError> {
        let mut reader = rlp::decode_list(blob)?;
        let first = reader.next_bytes()?.to_vec();

        // A two-item list is a leaf or extension, disambiguated by the
        // hex-prefix flag; a 17-item list is a branch.
        let second = reader.next_bytes()?;
        if reader.is_empty() {
            let (path, is_leaf) = Nibbles::decode_hex_prefix(&first)
                .ok_or(super::errors::TrieError::InvalidNodeShape)?;
            if is_leaf {
                return Ok(TrieNode::Leaf {
                    path,
                    value: second.to_vec(),
                });
            }
            let child = hash_from(second)?;
            return Ok(TrieNode::Extension { path, child });
        }

        let mut children: [Option<Hash>; 16] = Default::default();
        children[0] = optional_hash(&first)?;
        children[1] = optional_hash(second)?;
        for slot in children.iter_mut().skip(2) {
            *slot = optional_hash(reader.next_bytes()?)?;
        }
        // Value slot, unused for fixed-width keys.
        let value = reader.next_bytes()?;
        if !value.is_empty() || !reader.is_empty() {
            return Err(super::errors::TrieError::InvalidNodeShape);
        }
        Ok(TrieNode::Branch {
            children: Box::new(children),
        })
    }

    /// Compute the Keccak256 hash of the encoded node.
    pub fn hash(&self) -> Hash {
        keccak256(&self.encode())
    }

    /// Root hash of a trie with no entries.
    pub fn empty_root() -> Hash {
        EMPTY_TRIE_ROOT
    }
}

fn hash_from(bytes: &[u8]) -> Result<Hash, super::errors::TrieError> {
    if bytes.len() != 32 {
        return Err(super::errors::TrieError::InvalidNodeShape);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    Ok(out)
}

fn optional_hash(bytes: &[u8]) -> Result<Option<Hash>, super::errors::TrieError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    hash_from(bytes).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_roundtrip() {
        let node = TrieNode::Leaf {
            path: Nibbles(vec![1, 2, 3, 4, 5]),
            value: vec![0xAB, 0xCD, 0xEF],
        };
        let decoded = TrieNode::decode(&node.encode()).expect("leaf decode");
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_extension_roundtrip() {
        let node = TrieNode::Extension {
            path: Nibbles(vec![0, 15]),
            child: keccak256(b"child"),
        };
        let decoded = TrieNode::decode(&node.encode()).expect("extension decode");
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_branch_roundtrip() {
        let mut children: [Option<Hash>; 16] = Default::default();
        children[3] = Some(keccak256(b"three"));
        children[12] = Some(keccak256(b"twelve"));
        let node = TrieNode::Branch {
            children: Box::new(children),
        };
        let decoded = TrieNode::decode(&node.encode()).expect("branch decode");
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_hash_is_stable() {
        let node = TrieNode::Leaf {
            path: Nibbles(vec![1, 2]),
            value: vec![0x01],
        };
        assert_eq!(node.hash(), node.hash());
        assert_ne!(node.hash(), EMPTY_TRIE_ROOT);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(TrieNode::decode(&[]).is_err());
        assert!(TrieNode::decode(&[0x80]).is_err());
        assert!(TrieNode::decode(b"definitely not rlp").is_err());
    }
}
