//! # Snapshot Merge Iterators
//!
//! ## The Problem
//!
//! Jobs like snapshot verification need the complete flat state at a root,
//! but that state is spread across the disk layer and every diff layer in
//! the lineage, with younger layers shadowing older ones.
//!
//! ## The Solution
//!
//! K-way merge over one cursor per layer: diff cursors walk a sorted copy
//! of the layer's keys, the disk cursor pages through the store prefix in
//! chunks. A binary heap keyed on `(key, layer_age)` yields each key once
//! in ascending order; the youngest layer carrying the key supplies the
//! value, and tombstones suppress the key outright. A layer going stale
//! mid-iteration aborts the merge instead of mixing old and new stacks.

use crate::errors::SnapshotError;
use crate::layers::{DiffLayer, SnapshotTree};
use sediment_trie::ports::KeyValueStore;
use sediment_trie::schema;
use sediment_types::{Account, Hash, KeyHash};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;

/// Disk cursor page size.
const DISK_BATCH: usize = 1024;

/// Smallest key strictly greater than `key`, if any.
pub(crate) fn key_after(key: &KeyHash) -> Option<KeyHash> {
    let mut next = *key;
    for byte in next.iter_mut().rev() {
        let (bumped, overflow) = byte.overflowing_add(1);
        *byte = bumped;
        if !overflow {
            return Some(next);
        }
    }
    None
}

// =============================================================================
// CURSORS
// =============================================================================

enum Cursor {
    /// Sorted copy of one diff layer's entries. `None` values are
    /// tombstones.
    Memory {
        entries: Vec<(KeyHash, Option<Vec<u8>>)>,
        pos: usize,
    },
    /// Paged view over a disk-layer prefix.
    Disk {
        store: Arc<dyn KeyValueStore>,
        prefix: Vec<u8>,
        buffer: VecDeque<(KeyHash, Vec<u8>)>,
        next_start: Option<Vec<u8>>,
    },
}

impl Cursor {
    fn disk(store: Arc<dyn KeyValueStore>, prefix: Vec<u8>, start: &KeyHash) -> Self {
        Cursor::Disk {
            store,
            prefix,
            buffer: VecDeque::new(),
            next_start: Some(start.to_vec()),
        }
    }

    /// Key this cursor currently points at, refilling disk pages on demand.
    fn current(&mut self) -> Result<Option<KeyHash>, SnapshotError> {
        self.refill()?;
        Ok(match self {
            Cursor::Memory { entries, pos } => entries.get(*pos).map(|(k, _)| *k),
            Cursor::Disk { buffer, .. } => buffer.front().map(|(k, _)| *k),
        })
    }

    /// Consume and return the current entry.
    fn take(&mut self) -> Result<Option<(KeyHash, Option<Vec<u8>>)>, SnapshotError> {
        self.refill()?;
        Ok(match self {
            Cursor::Memory { entries, pos } => {
                let entry = entries.get(*pos).cloned();
                if entry.is_some() {
                    *pos += 1;
                }
                entry
            }
            Cursor::Disk { buffer, .. } => buffer.pop_front().map(|(k, v)| (k, Some(v))),
        })
    }

    fn refill(&mut self) -> Result<(), SnapshotError> {
        let Cursor::Disk {
            store,
            prefix,
            buffer,
            next_start,
        } = self
        else {
            return Ok(());
        };
        if !buffer.is_empty() {
            return Ok(());
        }
        let Some(start) = next_start.clone() else {
            return Ok(());
        };

        let mut fetched = 0;
        let mut last = None;
        for (raw_key, value) in store.iter_prefix(prefix, &start)?.take(DISK_BATCH) {
            fetched += 1;
            let suffix = &raw_key[prefix.len()..];
            if suffix.len() != 32 {
                continue;
            }
            let mut key = [0u8; 32];
            key.copy_from_slice(suffix);
            buffer.push_back((key, value));
            last = Some(key);
        }
        *next_start = if fetched < DISK_BATCH {
            None
        } else {
            last.and_then(|k| key_after(&k)).map(|k| k.to_vec())
        };
        Ok(())
    }
}

// =============================================================================
// MERGE CORE
// =============================================================================

/// Heap-driven merge shared by the account and storage iterators.
///
/// Cursor index doubles as layer age: index 0 is the youngest layer, the
/// disk cursor is last. Ties on a key resolve to the smallest index.
struct MergeIter {
    cursors: Vec<Cursor>,
    heap: BinaryHeap<Reverse<(KeyHash, usize)>>,
    lineage: Vec<Arc<DiffLayer>>,
}

impl MergeIter {
    fn new(cursors: Vec<Cursor>, lineage: Vec<Arc<DiffLayer>>) -> Result<Self, SnapshotError> {
        let mut merge = Self {
            cursors,
            heap: BinaryHeap::new(),
            lineage,
        };
        for index in 0..merge.cursors.len() {
            if let Some(key) = merge.cursors[index].current()? {
                merge.heap.push(Reverse((key, index)));
            }
        }
        Ok(merge)
    }

    fn check_stale(&self) -> Result<(), SnapshotError> {
        for layer in &self.lineage {
            if layer.is_stale() {
                return Err(SnapshotError::StaleLayer(layer.root()));
            }
        }
        Ok(())
    }

    /// Next live `(key, value)` pair, skipping tombstoned keys.
    fn next_entry(&mut self) -> Result<Option<(KeyHash, Vec<u8>)>, SnapshotError> {
        loop {
            let Some(Reverse((key, first))) = self.heap.pop() else {
                return Ok(None);
            };
            self.check_stale()?;

            // Pull every cursor sitting on the same key; the youngest
            // (smallest index) supplies the value.
            let mut indices = vec![first];
            while let Some(&Reverse((next_key, index))) = self.heap.peek() {
                if next_key != key {
                    break;
                }
                self.heap.pop();
                indices.push(index);
            }
            let winner = *indices.iter().min().unwrap_or(&first);

            let mut value = None;
            for index in indices {
                if let Some((_, entry)) = self.cursors[index].take()? {
                    if index == winner {
                        value = Some(entry);
                    }
                }
                if let Some(next_key) = self.cursors[index].current()? {
                    self.heap.push(Reverse((next_key, index)));
                }
            }

            match value.flatten() {
                Some(live) if !live.is_empty() => return Ok(Some((key, live))),
                // None or empty: the youngest layer tombstoned this key.
                _ => continue,
            }
        }
    }
}

// =============================================================================
// PUBLIC ITERATORS
// =============================================================================

/// Ascending iterator over every live account at a state root.
pub struct AccountIterator {
    merge: MergeIter,
}

impl AccountIterator {
    pub fn new(tree: &SnapshotTree, root: Hash, start: &KeyHash) -> Result<Self, SnapshotError> {
        let lineage = tree.lineage(root)?;
        let mut cursors: Vec<Cursor> = lineage
            .iter()
            .map(|layer| Cursor::Memory {
                entries: layer
                    .sorted_accounts()
                    .into_iter()
                    .filter(|(key, _)| key >= start)
                    .collect(),
                pos: 0,
            })
            .collect();
        cursors.push(Cursor::disk(
            tree.store(),
            schema::SNAP_ACCOUNT_PREFIX.to_vec(),
            start,
        ));
        Ok(Self {
            merge: MergeIter::new(cursors, lineage)?,
        })
    }
}

impl Iterator for AccountIterator {
    type Item = Result<(KeyHash, Account), SnapshotError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.merge.next_entry() {
            Ok(Some((key, blob))) => Some(
                Account::decode_slim(&blob)
                    .map(|account| (key, account))
                    .map_err(SnapshotError::from),
            ),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Ascending iterator over one account's live storage slots at a root.
pub struct StorageIterator {
    merge: MergeIter,
}

impl StorageIterator {
    pub fn new(
        tree: &SnapshotTree,
        root: Hash,
        account: &KeyHash,
        start: &KeyHash,
    ) -> Result<Self, SnapshotError> {
        let lineage = tree.lineage(root)?;
        let mut cursors = Vec::with_capacity(lineage.len() + 1);
        let mut masked = false;
        for layer in &lineage {
            cursors.push(Cursor::Memory {
                entries: layer
                    .sorted_storage(account)
                    .into_iter()
                    .filter(|(key, _)| key >= start)
                    .map(|(key, value)| {
                        let value = (!value.is_empty()).then_some(value);
                        (key, value)
                    })
                    .collect(),
                pos: 0,
            });
            // An account deletion cuts off everything older than this layer.
            if matches!(layer.account_entry(account), Some(None)) {
                masked = true;
                break;
            }
        }
        if !masked {
            let mut prefix = schema::SNAP_STORAGE_PREFIX.to_vec();
            prefix.extend_from_slice(account);
            cursors.push(Cursor::disk(tree.store(), prefix, start));
        }
        Ok(Self {
            merge: MergeIter::new(cursors, lineage)?,
        })
    }
}

impl Iterator for StorageIterator {
    type Item = Result<(KeyHash, Vec<u8>), SnapshotError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.merge.next_entry().transpose()
    }
}
