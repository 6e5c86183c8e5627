//! Deterministic trie construction.
//!
//! Commits a complete account/storage mapping into the node store under a
//! chosen scheme and returns the state root. Incremental per-block trie
//! updates happen outside this workspace; the builder exists so the
//! generator, the verifiers and the test fixtures have an authoritative
//! trie to walk.

use crate::domain::{Nibbles, NodeRef, TrieError, TrieNode};
use crate::ports::{KeyValueStore, WriteBatch};
use crate::schema::{self, Scheme};
use sediment_types::{hex32, Account, Hash, KeyHash, EMPTY_TRIE_ROOT, ZERO_HASH};
use std::collections::BTreeMap;
use tracing::debug;

/// Raw slot values per slot hash.
pub type StorageMap = BTreeMap<KeyHash, Vec<u8>>;

/// Commit a full state into the store.
///
/// Storage tries are committed first (bottom-up); each account's
/// `storage_root` is overwritten with the committed root, so callers may
/// leave it defaulted. Returns the account-trie root and the finalized
/// account records. Same state always produces the same root.
pub fn commit_state(
    store: &dyn KeyValueStore,
    scheme: Scheme,
    accounts: &BTreeMap<KeyHash, Account>,
    storages: &BTreeMap<KeyHash, StorageMap>,
) -> Result<(Hash, BTreeMap<KeyHash, Account>), TrieError> {
    let mut finalized = BTreeMap::new();
    for (account_hash, account) in accounts {
        let mut account = account.clone();
        account.storage_root = match storages.get(account_hash) {
            Some(slots) if !slots.is_empty() => {
                let wrapped: BTreeMap<KeyHash, Vec<u8>> = slots
                    .iter()
                    .map(|(slot, value)| (*slot, sediment_types::rlp::encode_bytes(value)))
                    .collect();
                commit_trie(store, scheme, *account_hash, &wrapped)?
            }
            _ => EMPTY_TRIE_ROOT,
        };
        finalized.insert(*account_hash, account);
    }

    let items: BTreeMap<KeyHash, Vec<u8>> = finalized
        .iter()
        .map(|(hash, account)| (*hash, account.encode_full()))
        .collect();
    let root = commit_trie(store, scheme, ZERO_HASH, &items)?;
    debug!(
        root = %hex32(&root),
        accounts = finalized.len(),
        "state committed"
    );
    Ok((root, finalized))
}

/// Commit one trie (account or storage) and return its root.
///
/// All nodes of the trie land in a single write batch, so a crash never
/// leaves the trie partially present.
pub fn commit_trie(
    store: &dyn KeyValueStore,
    scheme: Scheme,
    owner: Hash,
    items: &BTreeMap<KeyHash, Vec<u8>>,
) -> Result<Hash, TrieError> {
    if items.is_empty() {
        return Ok(EMPTY_TRIE_ROOT);
    }
    let entries: Vec<(Nibbles, &[u8])> = items
        .iter()
        .map(|(key, value)| (Nibbles::from_key(key), value.as_slice()))
        .collect();

    let mut batch = WriteBatch::new();
    let root = build(&entries, 0, &Nibbles::default(), owner, scheme, &mut batch);
    store.write(batch)?;
    Ok(root)
}

/// Root of `items` without persisting anything. Used to check externally
/// assembled state (e.g. snapshot contents) against an expected root.
pub fn compute_root(items: &BTreeMap<KeyHash, Vec<u8>>) -> Hash {
    if items.is_empty() {
        return EMPTY_TRIE_ROOT;
    }
    let entries: Vec<(Nibbles, &[u8])> = items
        .iter()
        .map(|(key, value)| (Nibbles::from_key(key), value.as_slice()))
        .collect();
    let mut scratch = WriteBatch::new();
    build(
        &entries,
        0,
        &Nibbles::default(),
        ZERO_HASH,
        Scheme::Hash,
        &mut scratch,
    )
}

/// Build the subtree covering `entries`, all of which share their first
/// `depth` nibbles. `node_path` is that shared prefix. Returns the node
/// hash and stages the encoded node into `batch`.
fn build(
    entries: &[(Nibbles, &[u8])],
    depth: usize,
    node_path: &Nibbles,
    owner: Hash,
    scheme: Scheme,
    batch: &mut WriteBatch,
) -> Hash {
    debug_assert!(!entries.is_empty());

    if entries.len() == 1 {
        let (key, value) = &entries[0];
        let node = TrieNode::Leaf {
            path: key.slice(depth),
            value: value.to_vec(),
        };
        return stage(node, node_path, owner, scheme, batch);
    }

    // Entries are sorted, so the common prefix of first and last covers all.
    let first = &entries[0].0;
    let last = &entries[entries.len() - 1].0;
    let common = first.slice(depth).common_prefix_len(&last.slice(depth));

    if common > 0 {
        let shared = Nibbles(first.0[depth..depth + common].to_vec());
        let child_path = node_path.join(&shared);
        let child = build(entries, depth + common, &child_path, owner, scheme, batch);
        let node = TrieNode::Extension {
            path: shared,
            child,
        };
        return stage(node, node_path, owner, scheme, batch);
    }

    let mut children: [Option<Hash>; 16] = Default::default();
    let mut lo = 0;
    while lo < entries.len() {
        let nibble = entries[lo].0.at(depth);
        let mut hi = lo + 1;
        while hi < entries.len() && entries[hi].0.at(depth) == nibble {
            hi += 1;
        }
        let child_path = node_path.push(nibble);
        children[nibble as usize] = Some(build(
            &entries[lo..hi],
            depth + 1,
            &child_path,
            owner,
            scheme,
            batch,
        ));
        lo = hi;
    }
    let node = TrieNode::Branch {
        children: Box::new(children),
    };
    stage(node, node_path, owner, scheme, batch)
}

fn stage(
    node: TrieNode,
    node_path: &Nibbles,
    owner: Hash,
    scheme: Scheme,
    batch: &mut WriteBatch,
) -> Hash {
    let blob = node.encode();
    let hash = sediment_types::keccak256(&blob);
    let reference = NodeRef {
        owner,
        path: node_path.clone(),
        hash,
    };
    schema::stage_node(batch, scheme, &reference, &blob);
    hash
}
