//! # Snapshot Layer Stack
//!
//! ## The Problem
//!
//! Reading an account through the trie costs one store lookup per nibble of
//! depth. Block processing reads thousands of accounts per block, and most
//! reads target state within a few blocks of the head.
//!
//! ## The Solution
//!
//! Keep the flat state as a stack of layers: one persisted disk layer
//! holding the last committed flat state, and one in-memory diff layer per
//! recent block holding only that block's mutations. A read walks from the
//! requested root down through its ancestor diffs and ends at the disk
//! layer. Flattening folds the oldest diffs into the disk layer once they
//! fall outside the retention window; a reorg discards a layer and its
//! descendants.
//!
//! Layers are never mutated after creation, only marked stale. Readers that
//! raced a flatten or a discard observe the stale flag and retry against
//! the new stack instead of seeing mixed state.

use crate::errors::SnapshotError;
use crate::generator::Coverage;
use sediment_trie::ports::{KeyValueStore, WriteBatch};
use sediment_trie::schema;
use sediment_types::{Account, Hash, KeyHash, EMPTY_TRIE_ROOT};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Outcome of a snapshot read.
///
/// `Unknown` only comes from the disk layer, for keys beyond the
/// generator's watermark. Callers resolve it against the trie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The key exists with this value.
    Confirmed(T),
    /// The key authoritatively does not exist at this root.
    Deleted,
    /// The snapshot cannot answer for this key.
    Unknown,
}

impl<T> Lookup<T> {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Lookup::Unknown)
    }

    pub fn confirmed(self) -> Option<T> {
        match self {
            Lookup::Confirmed(value) => Some(value),
            _ => None,
        }
    }
}

// =============================================================================
// DIFF LAYER
// =============================================================================

/// One block's worth of flat-state mutations.
///
/// Immutable after construction. Accounts map to their slim encoding, with
/// `None` as the deletion tombstone; slots map to raw values, with the
/// empty value as the tombstone.
pub struct DiffLayer {
    root: Hash,
    parent: Hash,
    stale: AtomicBool,
    accounts: HashMap<KeyHash, Option<Vec<u8>>>,
    storage: HashMap<KeyHash, HashMap<KeyHash, Vec<u8>>>,
}

impl DiffLayer {
    pub fn root(&self) -> Hash {
        self.root
    }

    pub fn parent(&self) -> Hash {
        self.parent
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    pub(crate) fn account_entry(&self, key: &KeyHash) -> Option<&Option<Vec<u8>>> {
        self.accounts.get(key)
    }

    pub(crate) fn storage_entry(&self, account: &KeyHash, slot: &KeyHash) -> Option<&Vec<u8>> {
        self.storage.get(account).and_then(|slots| slots.get(slot))
    }

    pub(crate) fn sorted_accounts(&self) -> Vec<(KeyHash, Option<Vec<u8>>)> {
        let mut entries: Vec<_> = self
            .accounts
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub(crate) fn sorted_storage(&self, account: &KeyHash) -> Vec<(KeyHash, Vec<u8>)> {
        let mut entries: Vec<_> = self
            .storage
            .get(account)
            .map(|slots| slots.iter().map(|(k, v)| (*k, v.clone())).collect())
            .unwrap_or_default();
        entries.sort_by(|a: &(KeyHash, Vec<u8>), b: &(KeyHash, Vec<u8>)| a.0.cmp(&b.0));
        entries
    }

    /// Rough heap footprint, for flatten logging.
    fn mem_size(&self) -> usize {
        let accounts: usize = self
            .accounts
            .values()
            .map(|v| 32 + v.as_ref().map_or(0, Vec::len))
            .sum();
        let storage: usize = self
            .storage
            .values()
            .map(|slots| slots.values().map(|v| 64 + v.len()).sum::<usize>())
            .sum();
        accounts + storage
    }
}

// =============================================================================
// SNAPSHOT TREE
// =============================================================================

struct TreeInner {
    disk_root: Hash,
    diffs: HashMap<Hash, Arc<DiffLayer>>,
}

/// The layer stack, keyed by state root.
pub struct SnapshotTree {
    store: Arc<dyn KeyValueStore>,
    inner: RwLock<TreeInner>,
}

impl SnapshotTree {
    /// Load the stack from the store. The disk layer root comes from the
    /// snapshot meta record; a store with no snapshot starts empty.
    pub fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, SnapshotError> {
        let disk_root = schema::read_snapshot_root(store.as_ref())?.unwrap_or(EMPTY_TRIE_ROOT);
        Ok(Self {
            store,
            inner: RwLock::new(TreeInner {
                disk_root,
                diffs: HashMap::new(),
            }),
        })
    }

    pub fn disk_root(&self) -> Hash {
        self.read_inner().disk_root
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    /// Number of diff layers currently held.
    pub fn depth(&self) -> usize {
        self.read_inner().diffs.len()
    }

    fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, TreeInner> {
        // Poisoning only happens if a writer panicked; snapshot writers
        // never panic between invariant updates.
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_inner(&self) -> std::sync::RwLockWriteGuard<'_, TreeInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Resolve the diff lineage from `root` down to the disk layer,
    /// youngest first. Empty for the disk root itself.
    pub(crate) fn lineage(&self, root: Hash) -> Result<Vec<Arc<DiffLayer>>, SnapshotError> {
        let inner = self.read_inner();
        let mut chain = Vec::new();
        let mut cursor = root;
        while cursor != inner.disk_root {
            let layer = inner
                .diffs
                .get(&cursor)
                .ok_or(SnapshotError::UnknownLayer(root))?;
            cursor = layer.parent();
            chain.push(Arc::clone(layer));
        }
        Ok(chain)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Look up an account at a given state root.
    pub fn account(&self, root: Hash, key: &KeyHash) -> Result<Lookup<Account>, SnapshotError> {
        match self.account_slim(root, key)? {
            Lookup::Confirmed(blob) => Ok(Lookup::Confirmed(Account::decode_slim(&blob)?)),
            Lookup::Deleted => Ok(Lookup::Deleted),
            Lookup::Unknown => Ok(Lookup::Unknown),
        }
    }

    /// Account lookup without decoding, shared with the iterators.
    pub(crate) fn account_slim(
        &self,
        root: Hash,
        key: &KeyHash,
    ) -> Result<Lookup<Vec<u8>>, SnapshotError> {
        for layer in self.lineage(root)? {
            if layer.is_stale() {
                return Err(SnapshotError::StaleLayer(layer.root()));
            }
            if let Some(entry) = layer.account_entry(key) {
                return Ok(match entry {
                    Some(blob) => Lookup::Confirmed(blob.clone()),
                    None => Lookup::Deleted,
                });
            }
        }
        self.disk_account(key)
    }

    /// Look up a storage slot at a given state root.
    pub fn storage(
        &self,
        root: Hash,
        account: &KeyHash,
        slot: &KeyHash,
    ) -> Result<Lookup<Vec<u8>>, SnapshotError> {
        for layer in self.lineage(root)? {
            if layer.is_stale() {
                return Err(SnapshotError::StaleLayer(layer.root()));
            }
            if let Some(entry) = layer.account_entry(account) {
                if entry.is_none() {
                    // The whole account is gone at this layer.
                    return Ok(Lookup::Deleted);
                }
            }
            if let Some(value) = layer.storage_entry(account, slot) {
                return Ok(if value.is_empty() {
                    Lookup::Deleted
                } else {
                    Lookup::Confirmed(value.clone())
                });
            }
        }
        self.disk_storage(account, slot)
    }

    fn disk_account(&self, key: &KeyHash) -> Result<Lookup<Vec<u8>>, SnapshotError> {
        if let Some(blob) = self.store.get(&schema::snap_account_key(key))? {
            return Ok(Lookup::Confirmed(blob));
        }
        let coverage = Coverage::load(self.store.as_ref())?;
        Ok(if coverage.covers_account(key) {
            Lookup::Deleted
        } else {
            Lookup::Unknown
        })
    }

    fn disk_storage(
        &self,
        account: &KeyHash,
        slot: &KeyHash,
    ) -> Result<Lookup<Vec<u8>>, SnapshotError> {
        if let Some(value) = self.store.get(&schema::snap_storage_key(account, slot))? {
            return Ok(Lookup::Confirmed(value));
        }
        let coverage = Coverage::load(self.store.as_ref())?;
        Ok(if coverage.covers_storage(account, slot) {
            Lookup::Deleted
        } else {
            Lookup::Unknown
        })
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Append a diff layer for a newly processed block.
    ///
    /// `accounts` maps each touched account to its new record (`None`
    /// deletes it); `storage` maps touched slots to raw values (empty value
    /// deletes the slot).
    pub fn update(
        &self,
        parent_root: Hash,
        new_root: Hash,
        accounts: HashMap<KeyHash, Option<Account>>,
        storage: HashMap<KeyHash, HashMap<KeyHash, Vec<u8>>>,
    ) -> Result<(), SnapshotError> {
        let mut inner = self.write_inner();
        if parent_root != inner.disk_root && !inner.diffs.contains_key(&parent_root) {
            return Err(SnapshotError::UnknownParent {
                parent: parent_root,
                child: new_root,
            });
        }
        if new_root == inner.disk_root || inner.diffs.contains_key(&new_root) {
            return Err(SnapshotError::DuplicateLayer(new_root));
        }

        let accounts = accounts
            .into_iter()
            .map(|(key, account)| (key, account.map(|a| a.encode_slim())))
            .collect();
        let layer = DiffLayer {
            root: new_root,
            parent: parent_root,
            stale: AtomicBool::new(false),
            accounts,
            storage,
        };
        debug!(
            root = %sediment_types::hex32(&new_root),
            parent = %sediment_types::hex32(&parent_root),
            "snapshot diff layer added"
        );
        inner.diffs.insert(new_root, Arc::new(layer));
        Ok(())
    }

    /// Flatten layers below the retention window into the disk layer.
    ///
    /// Keeps at most `retain` diff layers between `root` and disk. Returns
    /// the number of layers flattened. Flattened layers and any forks left
    /// dangling by the move are marked stale.
    pub fn cap(&self, root: Hash, retain: usize) -> Result<usize, SnapshotError> {
        let mut inner = self.write_inner();

        // Resolve the lineage oldest-first under the write lock.
        let mut chain = Vec::new();
        let mut cursor = root;
        while cursor != inner.disk_root {
            let layer = inner
                .diffs
                .get(&cursor)
                .ok_or(SnapshotError::UnknownLayer(root))?;
            cursor = layer.parent();
            chain.push(Arc::clone(layer));
        }
        chain.reverse();

        if chain.len() <= retain {
            return Ok(0);
        }
        let flatten = chain.len() - retain;

        // Fold the doomed layers into one overlay, youngest entry per key
        // winning. An account deletion drops slots staged by older folded
        // layers and schedules the account's persisted slots for removal.
        let mut accounts: HashMap<KeyHash, Option<Vec<u8>>> = HashMap::new();
        let mut storage: HashMap<KeyHash, HashMap<KeyHash, Option<Vec<u8>>>> = HashMap::new();
        let mut cleared: HashSet<KeyHash> = HashSet::new();
        let mut bytes = 0usize;
        for layer in &chain[..flatten] {
            bytes += layer.mem_size();
            for (key, entry) in &layer.accounts {
                if entry.is_none() {
                    cleared.insert(*key);
                    storage.remove(key);
                }
                accounts.insert(*key, entry.clone());
            }
            for (account, slots) in &layer.storage {
                let merged = storage.entry(*account).or_default();
                for (slot, value) in slots {
                    merged.insert(*slot, (!value.is_empty()).then(|| value.clone()));
                }
            }
        }

        let mut batch = WriteBatch::new();
        // Persisted slot deletions go first; a recreation folded in the same
        // pass re-stages its slots below and wins within the batch.
        for key in &cleared {
            let mut prefix = schema::SNAP_STORAGE_PREFIX.to_vec();
            prefix.extend_from_slice(key);
            for (slot_key, _) in self.store.iter_prefix(&prefix, &[])? {
                batch.delete(slot_key);
            }
        }
        for (key, entry) in &accounts {
            match entry {
                Some(blob) => batch.put(schema::snap_account_key(key), blob.clone()),
                None => batch.delete(schema::snap_account_key(key)),
            }
        }
        for (account, slots) in &storage {
            for (slot, value) in slots {
                match value {
                    Some(value) => {
                        batch.put(schema::snap_storage_key(account, slot), value.clone())
                    }
                    None => batch.delete(schema::snap_storage_key(account, slot)),
                }
            }
        }
        let new_disk_root = chain[flatten - 1].root();
        schema::stage_snapshot_root(&mut batch, &new_disk_root);
        self.store.write(batch)?;

        for layer in &chain[..flatten] {
            layer.mark_stale();
            inner.diffs.remove(&layer.root());
        }
        inner.disk_root = new_disk_root;
        Self::drop_orphans(&mut inner);

        info!(
            flattened = flatten,
            bytes,
            disk_root = %sediment_types::hex32(&new_disk_root),
            "snapshot layers flattened into disk"
        );
        Ok(flatten)
    }

    /// Discard a layer and every descendant, e.g. on a reorg.
    pub fn discard(&self, root: Hash) -> Result<(), SnapshotError> {
        let mut inner = self.write_inner();
        if root == inner.disk_root {
            return Err(SnapshotError::DiskLayer);
        }
        if !inner.diffs.contains_key(&root) {
            return Err(SnapshotError::UnknownLayer(root));
        }

        let mut doomed = vec![root];
        let mut index = 0;
        while index < doomed.len() {
            let parent = doomed[index];
            for (child_root, layer) in &inner.diffs {
                if layer.parent() == parent && !doomed.contains(child_root) {
                    doomed.push(*child_root);
                }
            }
            index += 1;
        }
        for root in &doomed {
            if let Some(layer) = inner.diffs.remove(root) {
                layer.mark_stale();
            }
        }
        debug!(discarded = doomed.len(), "snapshot layers discarded");
        Ok(())
    }

    /// Remove diffs whose ancestry no longer reaches the disk layer.
    fn drop_orphans(inner: &mut TreeInner) {
        loop {
            let orphan = inner.diffs.iter().find_map(|(root, layer)| {
                let parent = layer.parent();
                if parent != inner.disk_root && !inner.diffs.contains_key(&parent) {
                    Some(*root)
                } else {
                    None
                }
            });
            match orphan {
                Some(root) => {
                    if let Some(layer) = inner.diffs.remove(&root) {
                        layer.mark_stale();
                    }
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sediment_trie::adapters::MemoryStore;
    use sediment_types::keccak256;

    fn root(seed: u8) -> Hash {
        keccak256(&[b'r', seed])
    }

    fn acct(seed: u8) -> KeyHash {
        keccak256(&[b'a', seed])
    }

    fn tree() -> SnapshotTree {
        SnapshotTree::open(Arc::new(MemoryStore::new())).expect("open tree")
    }

    fn one_account(key: KeyHash, balance: u64) -> HashMap<KeyHash, Option<Account>> {
        let mut accounts = HashMap::new();
        accounts.insert(key, Some(Account::with_balance(balance)));
        accounts
    }

    #[test]
    fn test_diff_read_hits_youngest_layer() {
        let tree = tree();
        let disk = tree.disk_root();
        let key = acct(1);
        tree.update(disk, root(1), one_account(key, 10), HashMap::new())
            .unwrap();
        tree.update(root(1), root(2), one_account(key, 20), HashMap::new())
            .unwrap();

        let at_1 = tree.account(root(1), &key).unwrap().confirmed().unwrap();
        let at_2 = tree.account(root(2), &key).unwrap().confirmed().unwrap();
        assert_eq!(at_1.balance, 10.into());
        assert_eq!(at_2.balance, 20.into(), "younger layer must win");
    }

    #[test]
    fn test_tombstone_reports_deleted() {
        let tree = tree();
        let disk = tree.disk_root();
        let key = acct(2);
        tree.update(disk, root(1), one_account(key, 10), HashMap::new())
            .unwrap();
        let mut deletion = HashMap::new();
        deletion.insert(key, None);
        tree.update(root(1), root(2), deletion, HashMap::new()).unwrap();

        assert_eq!(tree.account(root(2), &key).unwrap(), Lookup::Deleted);
        assert!(tree.account(root(1), &key).unwrap().confirmed().is_some());
    }

    #[test]
    fn test_uncovered_disk_miss_is_unknown() {
        let tree = tree();
        let disk = tree.disk_root();
        // No generator has run, so the disk layer covers nothing.
        assert!(tree.account(disk, &acct(3)).unwrap().is_unknown());
    }

    #[test]
    fn test_unknown_layer_is_rejected() {
        let tree = tree();
        match tree.account(root(9), &acct(1)) {
            Err(SnapshotError::UnknownLayer(_)) => {}
            other => panic!("expected UnknownLayer, got {other:?}"),
        }
    }

    #[test]
    fn test_update_requires_known_parent() {
        let tree = tree();
        let result = tree.update(root(8), root(9), HashMap::new(), HashMap::new());
        assert!(matches!(result, Err(SnapshotError::UnknownParent { .. })));
    }

    #[test]
    fn test_cap_respects_retention_and_persists() {
        let tree = tree();
        let mut parent = tree.disk_root();
        let key = acct(4);
        for depth in 0..5u8 {
            tree.update(
                parent,
                root(depth),
                one_account(key, depth as u64 + 1),
                HashMap::new(),
            )
            .unwrap();
            parent = root(depth);
        }
        assert_eq!(tree.depth(), 5);

        let flattened = tree.cap(root(4), 2).unwrap();
        assert_eq!(flattened, 3);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.disk_root(), root(2));

        // The flattened value is now served by the disk layer.
        let value = tree.account(root(2), &key).unwrap().confirmed().unwrap();
        assert_eq!(value.balance, 3.into());
        // And the youngest layers still override it.
        let value = tree.account(root(4), &key).unwrap().confirmed().unwrap();
        assert_eq!(value.balance, 5.into());
    }

    #[test]
    fn test_cap_below_retention_is_noop() {
        let tree = tree();
        let disk = tree.disk_root();
        tree.update(disk, root(1), one_account(acct(5), 1), HashMap::new())
            .unwrap();
        assert_eq!(tree.cap(root(1), 4).unwrap(), 0);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_discard_marks_descendants_stale() {
        let tree = tree();
        let disk = tree.disk_root();
        tree.update(disk, root(1), one_account(acct(6), 1), HashMap::new())
            .unwrap();
        tree.update(root(1), root(2), one_account(acct(6), 2), HashMap::new())
            .unwrap();
        let lineage = tree.lineage(root(2)).unwrap();

        tree.discard(root(1)).unwrap();
        assert_eq!(tree.depth(), 0);
        assert!(lineage.iter().all(|l| l.is_stale()));
        assert!(matches!(
            tree.account(root(2), &acct(6)),
            Err(SnapshotError::UnknownLayer(_))
        ));
    }

    #[test]
    fn test_cap_drops_dangling_fork() {
        let tree = tree();
        let disk = tree.disk_root();
        let key = acct(7);
        tree.update(disk, root(1), one_account(key, 1), HashMap::new())
            .unwrap();
        tree.update(root(1), root(2), one_account(key, 2), HashMap::new())
            .unwrap();
        // Fork off the soon-to-be-flattened bottom layer's parent.
        tree.update(disk, root(3), one_account(key, 3), HashMap::new())
            .unwrap();

        tree.cap(root(2), 0).unwrap();
        assert!(matches!(
            tree.account(root(3), &key),
            Err(SnapshotError::UnknownLayer(_))
        ));
    }

    #[test]
    fn test_storage_tombstone_and_account_deletion() {
        let tree = tree();
        let disk = tree.disk_root();
        let owner = acct(8);
        let slot = keccak256(b"slot");

        let mut storage = HashMap::new();
        let mut slots = HashMap::new();
        slots.insert(slot, b"value".to_vec());
        storage.insert(owner, slots);
        tree.update(disk, root(1), one_account(owner, 1), storage).unwrap();
        assert_eq!(
            tree.storage(root(1), &owner, &slot).unwrap(),
            Lookup::Confirmed(b"value".to_vec())
        );

        // Deleting the account shadows its storage entirely.
        let mut deletion = HashMap::new();
        deletion.insert(owner, None);
        tree.update(root(1), root(2), deletion, HashMap::new()).unwrap();
        assert_eq!(tree.storage(root(2), &owner, &slot).unwrap(), Lookup::Deleted);
    }

    fn one_slot(owner: KeyHash, slot: KeyHash, value: &[u8]) -> HashMap<KeyHash, HashMap<KeyHash, Vec<u8>>> {
        let mut slots = HashMap::new();
        slots.insert(slot, value.to_vec());
        let mut storage = HashMap::new();
        storage.insert(owner, slots);
        storage
    }

    fn delete_account(key: KeyHash) -> HashMap<KeyHash, Option<Account>> {
        let mut accounts = HashMap::new();
        accounts.insert(key, None);
        accounts
    }

    #[test]
    fn test_flatten_drops_slots_of_account_deleted_in_same_fold() {
        let tree = tree();
        let disk = tree.disk_root();
        let owner = acct(9);
        let slot = keccak256(b"folded slot");

        tree.update(disk, root(1), one_account(owner, 1), one_slot(owner, slot, b"value"))
            .unwrap();
        tree.update(root(1), root(2), delete_account(owner), HashMap::new())
            .unwrap();
        tree.cap(root(2), 0).unwrap();

        let store = tree.store();
        assert_eq!(store.get(&schema::snap_account_key(&owner)).unwrap(), None);
        assert_eq!(
            store.get(&schema::snap_storage_key(&owner, &slot)).unwrap(),
            None,
            "a slot must not survive its owning account's deletion"
        );
    }

    #[test]
    fn test_flatten_deletion_drops_previously_persisted_slots() {
        let tree = tree();
        let disk = tree.disk_root();
        let owner = acct(10);
        let slot = keccak256(b"persisted slot");

        tree.update(disk, root(1), one_account(owner, 1), one_slot(owner, slot, b"old"))
            .unwrap();
        tree.cap(root(1), 0).unwrap();
        let store = tree.store();
        assert!(store.get(&schema::snap_storage_key(&owner, &slot)).unwrap().is_some());

        tree.update(root(1), root(2), delete_account(owner), HashMap::new())
            .unwrap();
        tree.cap(root(2), 0).unwrap();
        assert_eq!(store.get(&schema::snap_storage_key(&owner, &slot)).unwrap(), None);
    }

    #[test]
    fn test_flatten_recreated_account_keeps_only_new_slots() {
        let tree = tree();
        let disk = tree.disk_root();
        let owner = acct(11);
        let old_slot = keccak256(b"old slot");
        let new_slot = keccak256(b"new slot");

        tree.update(disk, root(1), one_account(owner, 1), one_slot(owner, old_slot, b"old"))
            .unwrap();
        tree.cap(root(1), 0).unwrap();

        // Delete and recreate inside the same fold window.
        tree.update(root(1), root(2), delete_account(owner), HashMap::new())
            .unwrap();
        tree.update(root(2), root(3), one_account(owner, 2), one_slot(owner, new_slot, b"new"))
            .unwrap();
        tree.cap(root(3), 0).unwrap();

        let store = tree.store();
        assert_eq!(store.get(&schema::snap_storage_key(&owner, &old_slot)).unwrap(), None);
        assert_eq!(
            store.get(&schema::snap_storage_key(&owner, &new_slot)).unwrap(),
            Some(b"new".to_vec()),
            "slots written after the recreation must survive the fold"
        );
        assert!(store.get(&schema::snap_account_key(&owner)).unwrap().is_some());
    }
}
