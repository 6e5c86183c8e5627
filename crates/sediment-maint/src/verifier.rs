//! # Integrity Verifier
//!
//! Three read-only checks with increasing depth:
//!
//! - `traverse_state` resolves every account, its storage trie and its code
//!   at the account level, trusting stored node content
//! - `traverse_raw_state` additionally recomputes every node digest, so a
//!   single flipped byte anywhere in either trie is caught and attributed
//!   to the exact node reference
//! - `verify_state` rebuilds the state root from the flat snapshot and
//!   compares it against the trie root, proving the two views equivalent
//!
//! All three abort on the first fatal finding and report progress at a
//! fixed cadence while running.

use crate::errors::MaintError;
use sediment_snapshot::{AccountIterator, SnapshotTree, StorageIterator};
use sediment_trie::builder::compute_root;
use sediment_trie::ports::KeyValueStore;
use sediment_trie::schema::{self, Scheme};
use sediment_trie::{TrieError, TrieWalker};
use sediment_types::{hex32, rlp, Account, Hash, KeyHash, ZERO_HASH};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::info;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(8);

#[derive(Debug, Default)]
pub struct TraversalReport {
    pub accounts: u64,
    pub slots: u64,
    pub codes: u64,
    /// Only counted by the raw traversal.
    pub nodes: u64,
    pub elapsed: Duration,
}

struct Progress {
    started: Instant,
    last: Instant,
    label: &'static str,
}

impl Progress {
    fn new(label: &'static str) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last: now,
            label,
        }
    }

    fn tick(&mut self, report: &TraversalReport) {
        if self.last.elapsed() < PROGRESS_INTERVAL {
            return;
        }
        self.last = Instant::now();
        info!(
            accounts = report.accounts,
            slots = report.slots,
            codes = report.codes,
            nodes = report.nodes,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "{} progress",
            self.label
        );
    }

    fn finish(self, report: &mut TraversalReport) {
        report.elapsed = self.started.elapsed();
        info!(
            accounts = report.accounts,
            slots = report.slots,
            codes = report.codes,
            nodes = report.nodes,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "{} complete",
            self.label
        );
    }
}

/// Account-level traversal: every account decodes, every storage trie
/// resolves, every referenced code blob exists.
pub fn traverse_state(
    store: &dyn KeyValueStore,
    scheme: Scheme,
    root: Hash,
) -> Result<TraversalReport, MaintError> {
    traverse(store, scheme, root, false, "state traversal")
}

/// Node-level traversal: everything above, plus a digest check on every
/// single node of both tries.
pub fn traverse_raw_state(
    store: &dyn KeyValueStore,
    scheme: Scheme,
    root: Hash,
) -> Result<TraversalReport, MaintError> {
    traverse(store, scheme, root, true, "raw state traversal")
}

fn traverse(
    store: &dyn KeyValueStore,
    scheme: Scheme,
    root: Hash,
    check_hashes: bool,
    label: &'static str,
) -> Result<TraversalReport, MaintError> {
    info!(root = %hex32(&root), "{} started", label);
    let mut report = TraversalReport::default();
    let mut progress = Progress::new(label);

    let mut walker = TrieWalker::account(store, scheme, root);
    if check_hashes {
        walker = walker.verifying_hashes();
    }
    for visited in walker {
        let visited = visited?;
        if check_hashes {
            report.nodes += 1;
        }
        let Some((key, blob)) = visited.leaf else {
            progress.tick(&report);
            continue;
        };
        report.accounts += 1;
        let account = Account::decode_full(&blob)?;

        if !account.has_empty_storage() {
            let mut storage_walker =
                TrieWalker::storage(store, scheme, key, account.storage_root);
            if check_hashes {
                storage_walker = storage_walker.verifying_hashes();
            }
            for slot_node in storage_walker {
                let slot_node = slot_node?;
                if check_hashes {
                    report.nodes += 1;
                }
                if slot_node.leaf.is_some() {
                    report.slots += 1;
                }
                progress.tick(&report);
            }
        }
        if !account.has_empty_code() {
            if !schema::has_code(store, &account.code_hash)? {
                return Err(MaintError::Trie(TrieError::MissingCode {
                    code_hash: account.code_hash,
                }));
            }
            report.codes += 1;
        }
        progress.tick(&report);
    }

    progress.finish(&mut report);
    Ok(report)
}

/// Rebuild the state root from the snapshot and compare it to `root`.
///
/// Storage roots are recomputed from the slot iterators rather than taken
/// from the account records, so divergence anywhere in the flat state
/// surfaces as a root mismatch.
pub fn verify_state(tree: &SnapshotTree, root: Hash) -> Result<TraversalReport, MaintError> {
    info!(root = %hex32(&root), "snapshot verification started");
    let mut report = TraversalReport::default();
    let mut progress = Progress::new("snapshot verification");

    let mut accounts: BTreeMap<KeyHash, Vec<u8>> = BTreeMap::new();
    for entry in AccountIterator::new(tree, root, &ZERO_HASH)? {
        let (key, mut account) = entry?;
        report.accounts += 1;

        let mut slots: BTreeMap<KeyHash, Vec<u8>> = BTreeMap::new();
        for slot in StorageIterator::new(tree, root, &key, &ZERO_HASH)? {
            let (slot_key, value) = slot?;
            slots.insert(slot_key, rlp::encode_bytes(&value));
            report.slots += 1;
            progress.tick(&report);
        }
        account.storage_root = compute_root(&slots);
        accounts.insert(key, account.encode_full());
        progress.tick(&report);
    }

    let computed = compute_root(&accounts);
    if computed != root {
        return Err(MaintError::RootMismatch {
            expected: root,
            computed,
        });
    }
    progress.finish(&mut report);
    Ok(report)
}
