//! On-disk key schema.
//!
//! Every record lives in one keyspace, tagged by a single prefix byte.
//! Trie nodes are keyed by content hash under the hash-addressed scheme and
//! by `(owner, compact path)` under the path-addressed scheme.

use crate::domain::{Nibbles, NodeRef, TrieError};
use crate::ports::{KeyValueStore, StoreError, WriteBatch};
use sediment_types::{Hash, KeyHash, ZERO_HASH};

// =============================================================================
// PREFIXES
// =============================================================================

/// Hash-addressed trie node: 'h' ++ node_hash.
pub const NODE_HASH_PREFIX: &[u8] = b"h";
/// Path-addressed trie node: 'P' ++ owner ++ hex_prefix(path).
pub const NODE_PATH_PREFIX: &[u8] = b"P";
/// Contract code: 'c' ++ code_hash.
pub const CODE_PREFIX: &[u8] = b"c";
/// Snapshot account entry: 'A' ++ account_hash.
pub const SNAP_ACCOUNT_PREFIX: &[u8] = b"A";
/// Snapshot storage entry: 'S' ++ account_hash ++ slot_hash.
pub const SNAP_STORAGE_PREFIX: &[u8] = b"S";

// Meta keys.
const META_SCHEME: &[u8] = b"m:scheme";
const META_SNAPSHOT_ROOT: &[u8] = b"m:snapshot-root";
const META_GENERATOR_MARKER: &[u8] = b"m:snapshot-marker";
const META_STATE_ID: &[u8] = b"m:state-id";
const META_GENESIS_ROOT: &[u8] = b"m:genesis-root";

// =============================================================================
// SCHEMES
// =============================================================================

/// Node keying convention of a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    /// Nodes keyed by content hash. Required by the offline pruner.
    Hash,
    /// Nodes keyed by trie position. Pruning happens by history trimming
    /// instead; the offline pruner refuses to run here.
    Path,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Hash => "hash",
            Scheme::Path => "path",
        }
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"hash" => Some(Scheme::Hash),
            b"path" => Some(Scheme::Path),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store key for a node reference under a scheme.
pub fn node_key(scheme: Scheme, owner: &Hash, path: &Nibbles, hash: &Hash) -> Vec<u8> {
    match scheme {
        Scheme::Hash => {
            let mut key = Vec::with_capacity(33);
            key.extend_from_slice(NODE_HASH_PREFIX);
            key.extend_from_slice(hash);
            key
        }
        Scheme::Path => {
            let mut key = Vec::with_capacity(33 + path.len() / 2 + 1);
            key.extend_from_slice(NODE_PATH_PREFIX);
            key.extend_from_slice(owner);
            key.extend_from_slice(&path.encode_hex_prefix(false));
            key
        }
    }
}

/// Read a node blob by reference. `Ok(None)` means absent, which every
/// caller treats as `MissingNode`.
pub fn read_node(
    store: &dyn KeyValueStore,
    scheme: Scheme,
    reference: &NodeRef,
) -> Result<Option<Vec<u8>>, StoreError> {
    store.get(&node_key(
        scheme,
        &reference.owner,
        &reference.path,
        &reference.hash,
    ))
}

/// Stage a node write into a batch.
pub fn stage_node(batch: &mut WriteBatch, scheme: Scheme, reference: &NodeRef, blob: &[u8]) {
    batch.put(
        node_key(scheme, &reference.owner, &reference.path, &reference.hash),
        blob,
    );
}

// =============================================================================
// CODE
// =============================================================================

pub fn code_key(code_hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.extend_from_slice(CODE_PREFIX);
    key.extend_from_slice(code_hash);
    key
}

pub fn has_code(store: &dyn KeyValueStore, code_hash: &Hash) -> Result<bool, StoreError> {
    Ok(store.get(&code_key(code_hash))?.is_some())
}

pub fn read_code(store: &dyn KeyValueStore, code_hash: &Hash) -> Result<Option<Vec<u8>>, StoreError> {
    store.get(&code_key(code_hash))
}

pub fn write_code(store: &dyn KeyValueStore, code_hash: &Hash, code: &[u8]) -> Result<(), StoreError> {
    store.put(&code_key(code_hash), code)
}

// =============================================================================
// SNAPSHOT ENTRIES
// =============================================================================

pub fn snap_account_key(account: &KeyHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.extend_from_slice(SNAP_ACCOUNT_PREFIX);
    key.extend_from_slice(account);
    key
}

pub fn snap_storage_key(account: &KeyHash, slot: &KeyHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(65);
    key.extend_from_slice(SNAP_STORAGE_PREFIX);
    key.extend_from_slice(account);
    key.extend_from_slice(slot);
    key
}

// =============================================================================
// META
// =============================================================================

pub fn read_scheme(store: &dyn KeyValueStore) -> Result<Option<Scheme>, StoreError> {
    Ok(store.get(META_SCHEME)?.and_then(|v| Scheme::from_bytes(&v)))
}

pub fn write_scheme(store: &dyn KeyValueStore, scheme: Scheme) -> Result<(), StoreError> {
    store.put(META_SCHEME, scheme.as_str().as_bytes())
}

pub fn read_snapshot_root(store: &dyn KeyValueStore) -> Result<Option<Hash>, StoreError> {
    read_meta_hash(store, META_SNAPSHOT_ROOT)
}

pub fn write_snapshot_root(store: &dyn KeyValueStore, root: &Hash) -> Result<(), StoreError> {
    store.put(META_SNAPSHOT_ROOT, root)
}

/// Stage a snapshot-root update into a batch, so the flat-state content and
/// the root it belongs to land atomically.
pub fn stage_snapshot_root(batch: &mut WriteBatch, root: &Hash) {
    batch.put(META_SNAPSHOT_ROOT, root.as_slice());
}

pub fn delete_snapshot_root(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    store.delete(META_SNAPSHOT_ROOT)
}

pub fn read_genesis_root(store: &dyn KeyValueStore) -> Result<Option<Hash>, StoreError> {
    read_meta_hash(store, META_GENESIS_ROOT)
}

pub fn write_genesis_root(store: &dyn KeyValueStore, root: &Hash) -> Result<(), StoreError> {
    store.put(META_GENESIS_ROOT, root)
}

pub fn read_generator_marker(store: &dyn KeyValueStore) -> Result<Option<Vec<u8>>, StoreError> {
    store.get(META_GENERATOR_MARKER)
}

pub fn write_generator_marker(store: &dyn KeyValueStore, marker: &[u8]) -> Result<(), StoreError> {
    store.put(META_GENERATOR_MARKER, marker)
}

pub fn delete_generator_marker(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    store.delete(META_GENERATOR_MARKER)
}

/// Monotonic version counter reconciling node-store rewrites with the
/// external historical log.
pub fn read_state_id(store: &dyn KeyValueStore) -> Result<u64, StoreError> {
    Ok(store
        .get(META_STATE_ID)?
        .filter(|v| v.len() == 8)
        .map(|v| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&v);
            u64::from_be_bytes(buf)
        })
        .unwrap_or(0))
}

/// Bump and persist the state id, returning the new value.
pub fn bump_state_id(store: &dyn KeyValueStore) -> Result<u64, StoreError> {
    let next = read_state_id(store)? + 1;
    store.put(META_STATE_ID, &next.to_be_bytes())?;
    Ok(next)
}

fn read_meta_hash(store: &dyn KeyValueStore, key: &[u8]) -> Result<Option<Hash>, StoreError> {
    Ok(store.get(key)?.and_then(|v| {
        if v.len() != 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&v);
        Some(out)
    }))
}

/// Fetch a node blob, translating absence into the fatal traversal error.
pub fn require_node(
    store: &dyn KeyValueStore,
    scheme: Scheme,
    reference: &NodeRef,
) -> Result<Vec<u8>, TrieError> {
    read_node(store, scheme, reference)?
        .ok_or_else(|| TrieError::MissingNode(reference.clone()))
}

/// Node key helper for account-trie references under the hash scheme.
pub fn hash_scheme_key(hash: &Hash) -> Vec<u8> {
    node_key(Scheme::Hash, &ZERO_HASH, &Nibbles::default(), hash)
}
