//! # State Pruner
//!
//! ## The Problem
//!
//! A hash-addressed store accumulates every trie node ever written. Old
//! state versions share most nodes with newer ones, so nothing can be
//! deleted by age alone; a node is garbage only if no retained root can
//! reach it.
//!
//! ## The Solution
//!
//! Two-phase mark and sweep. Mark: walk the target root and the genesis
//! root (account trie, every storage trie, referenced code) into a
//! reachability filter. Sweep: scan all hash-scheme node keys and delete
//! those the filter rejects. The filter admits false positives but never
//! false negatives, so the sweep can only over-retain. Any error during
//! the mark phase aborts before a single delete is issued.
//!
//! The full variant trades the filter for an exact set over the genesis
//! state only, and also drops the flat snapshot. It exists for
//! storage-critical recoveries and is deliberately destructive to
//! historical state.

use crate::bloom::ReachabilityFilter;
use crate::errors::MaintError;
use sediment_trie::ports::{KeyValueStore, WriteBatch};
use sediment_trie::schema::{self, Scheme};
use sediment_trie::TrieWalker;
use sediment_types::{hex32, Account, Hash};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const DEFAULT_BLOOM_MB: usize = 256;
const SWEEP_BATCH: usize = 4096;
const PROGRESS_INTERVAL: Duration = Duration::from_secs(8);

#[derive(Debug, Default)]
pub struct PruneReport {
    pub nodes_scanned: u64,
    pub nodes_deleted: u64,
    pub codes_deleted: u64,
    pub bytes_freed: u64,
    pub elapsed: Duration,
    /// True when the sweep stopped early on an interrupt. Already-issued
    /// deletions are safe; a rerun finishes the job.
    pub interrupted: bool,
}

/// Targeted mark-and-sweep pruner. Requires the hash scheme.
pub struct Pruner {
    store: Arc<dyn KeyValueStore>,
    bloom_size_mb: usize,
    interrupt: Arc<AtomicBool>,
}

impl Pruner {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            bloom_size_mb: DEFAULT_BLOOM_MB,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_bloom_size_mb(mut self, megabytes: usize) -> Self {
        self.bloom_size_mb = megabytes;
        self
    }

    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Prune everything unreachable from `target_root` and the recorded
    /// genesis root. A store without a genesis root is refused.
    pub fn run(&self, target_root: Hash) -> Result<PruneReport, MaintError> {
        let started = Instant::now();
        require_scheme(self.store.as_ref(), Scheme::Hash)?;

        // Mark phase. Any failure here aborts with nothing deleted. A store
        // without a recorded genesis root cannot guarantee genesis survives
        // the sweep, so it is refused outright.
        let genesis = schema::read_genesis_root(self.store.as_ref())?
            .ok_or(MaintError::NoGenesisRoot)?;
        let mut filter = ReachabilityFilter::with_size_mb(self.bloom_size_mb);
        info!(root = %hex32(&target_root), "marking reachable state");
        let mut marked = walk_reachable(self.store.as_ref(), target_root, |item| match item {
            Reachable::Node(hash) | Reachable::Code(hash) => filter.insert(hash),
        })?;
        if genesis != target_root {
            info!(root = %hex32(&genesis), "marking genesis state");
            marked += walk_reachable(self.store.as_ref(), genesis, |item| match item {
                Reachable::Node(hash) | Reachable::Code(hash) => filter.insert(hash),
            })?;
        }
        info!(
            marked,
            fpr = filter.false_positive_rate(),
            "mark phase complete"
        );

        // Sweep phase.
        let mut report = PruneReport::default();
        self.sweep(
            schema::NODE_HASH_PREFIX,
            &filter,
            &mut report,
            started,
            false,
        )?;
        if !report.interrupted {
            self.sweep(schema::CODE_PREFIX, &filter, &mut report, started, true)?;
        }

        if !report.interrupted {
            let state_id = schema::bump_state_id(self.store.as_ref())?;
            info!(state_id, "prune complete, state id bumped");
        }
        report.elapsed = started.elapsed();
        info!(
            scanned = report.nodes_scanned,
            deleted = report.nodes_deleted,
            codes_deleted = report.codes_deleted,
            bytes_freed = report.bytes_freed,
            interrupted = report.interrupted,
            "prune finished"
        );
        Ok(report)
    }

    fn sweep(
        &self,
        prefix: &[u8],
        filter: &ReachabilityFilter,
        report: &mut PruneReport,
        started: Instant,
        code_pass: bool,
    ) -> Result<(), MaintError> {
        let mut batch = WriteBatch::new();
        let mut last_log = Instant::now();
        for (key, value) in self.store.iter_prefix(prefix, &[])? {
            let hash = &key[prefix.len()..];
            if hash.len() != 32 {
                continue;
            }
            if !code_pass {
                report.nodes_scanned += 1;
            }
            if filter.may_contain(hash) {
                continue;
            }
            report.bytes_freed += (key.len() + value.len()) as u64;
            if code_pass {
                report.codes_deleted += 1;
            } else {
                report.nodes_deleted += 1;
            }
            batch.delete(key);

            if batch.len() >= SWEEP_BATCH {
                self.store.write(std::mem::take(&mut batch))?;
                if self.interrupt.load(Ordering::Relaxed) {
                    report.interrupted = true;
                    return Ok(());
                }
                if last_log.elapsed() >= PROGRESS_INTERVAL {
                    last_log = Instant::now();
                    info!(
                        scanned = report.nodes_scanned,
                        deleted = report.nodes_deleted,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "sweep progress"
                    );
                }
            }
        }
        self.store.write(batch)?;
        Ok(())
    }
}

/// Full prune: keep only the genesis state, exactly.
///
/// Historical roots and the flat snapshot are destroyed; only the genesis
/// trie, its storage and its code survive. The reachable set is exact
/// (genesis states are small), so nothing extra is retained.
pub fn prune_all(store: &dyn KeyValueStore, genesis_root: Hash) -> Result<PruneReport, MaintError> {
    let started = Instant::now();
    require_scheme(store, Scheme::Hash)?;

    let mut nodes: HashSet<Hash> = HashSet::new();
    let mut codes: HashSet<Hash> = HashSet::new();
    walk_reachable(store, genesis_root, |item| match item {
        Reachable::Node(hash) => {
            nodes.insert(*hash);
        }
        Reachable::Code(code) => {
            codes.insert(*code);
        }
    })?;
    info!(
        root = %hex32(&genesis_root),
        reachable = nodes.len(),
        "genesis reachable set collected"
    );

    let mut report = PruneReport::default();
    let mut batch = WriteBatch::new();
    let flush = |store: &dyn KeyValueStore, batch: &mut WriteBatch| -> Result<(), MaintError> {
        if batch.len() >= SWEEP_BATCH {
            store.write(std::mem::take(batch))?;
        }
        Ok(())
    };

    for (key, value) in store.iter_prefix(schema::NODE_HASH_PREFIX, &[])? {
        report.nodes_scanned += 1;
        if key_in_set(&key, &nodes) {
            continue;
        }
        report.nodes_deleted += 1;
        report.bytes_freed += (key.len() + value.len()) as u64;
        batch.delete(key);
        flush(store, &mut batch)?;
    }
    for (key, value) in store.iter_prefix(schema::CODE_PREFIX, &[])? {
        if key_in_set(&key, &codes) {
            continue;
        }
        report.codes_deleted += 1;
        report.bytes_freed += (key.len() + value.len()) as u64;
        batch.delete(key);
        flush(store, &mut batch)?;
    }
    // The flat snapshot describes a pruned-away state; drop it wholesale.
    for prefix in [schema::SNAP_ACCOUNT_PREFIX, schema::SNAP_STORAGE_PREFIX] {
        for (key, value) in store.iter_prefix(prefix, &[])? {
            report.bytes_freed += (key.len() + value.len()) as u64;
            batch.delete(key);
            flush(store, &mut batch)?;
        }
    }
    store.write(batch)?;
    schema::delete_snapshot_root(store)?;
    schema::delete_generator_marker(store)?;

    let state_id = schema::bump_state_id(store)?;
    report.elapsed = started.elapsed();
    info!(
        state_id,
        deleted = report.nodes_deleted,
        bytes_freed = report.bytes_freed,
        "full prune complete"
    );
    Ok(report)
}

/// One item surfaced by the reachability walk.
pub(crate) enum Reachable<'a> {
    Node(&'a Hash),
    Code(&'a Hash),
}

/// Report every node hash and code hash reachable from `root` via the
/// account trie and all storage tries. Returns the node count.
pub(crate) fn walk_reachable(
    store: &dyn KeyValueStore,
    root: Hash,
    mut visit: impl FnMut(Reachable<'_>),
) -> Result<u64, MaintError> {
    let mut count = 0u64;
    for visited in TrieWalker::account(store, Scheme::Hash, root) {
        let visited = visited?;
        visit(Reachable::Node(&visited.reference.hash));
        count += 1;
        let Some((key, blob)) = visited.leaf else {
            continue;
        };
        let account = Account::decode_full(&blob)?;
        if !account.has_empty_code() {
            visit(Reachable::Code(&account.code_hash));
        }
        if !account.has_empty_storage() {
            for slot_node in TrieWalker::storage(store, Scheme::Hash, key, account.storage_root) {
                visit(Reachable::Node(&slot_node?.reference.hash));
                count += 1;
            }
        }
    }
    Ok(count)
}

/// True when the one-byte-prefixed key's 32-byte suffix is in `set`.
fn key_in_set(key: &[u8], set: &HashSet<Hash>) -> bool {
    let suffix = &key[1..];
    if suffix.len() != 32 {
        return false;
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(suffix);
    set.contains(&hash)
}

pub(crate) fn require_scheme(
    store: &dyn KeyValueStore,
    expected: Scheme,
) -> Result<(), MaintError> {
    let found = schema::read_scheme(store)?;
    if found != Some(expected) {
        return Err(MaintError::SchemeMismatch { expected, found });
    }
    Ok(())
}
