//! # Scheme Migrator
//!
//! ## The Problem
//!
//! Hash-addressed stores (one key per node content hash) support many
//! historical roots but can only be pruned offline. Path-addressed stores
//! (one key per trie position) prune by construction but hold a single
//! state. Moving a long-lived deployment from the former to the latter
//! means rewriting hundreds of gigabytes of nodes without a window where
//! neither layout is usable.
//!
//! ## The Solution
//!
//! Copy-then-cutover. Phase one walks the head state's account trie and
//! re-stages every node under its path-scheme key; phase two does the same
//! for all storage tries, sharded across a worker pool by owning account.
//! The hash-scheme originals stay untouched throughout, so interruption at
//! any batch boundary leaves the store exactly as consistent as before,
//! and rerunning simply re-copies. Only after the copy completes does the
//! cutover run: bump the persistent state id, reconcile the history log,
//! drop the hash-scheme nodes, and flip the scheme marker.

use crate::errors::MaintError;
use crate::pruner::require_scheme;
use rayon::prelude::*;
use sediment_trie::ports::{HistoryLog, KeyValueStore, WriteBatch};
use sediment_trie::schema::{self, Scheme};
use sediment_trie::TrieWalker;
use sediment_types::{hex32, Account, Hash, KeyHash};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const DEFAULT_JOBS: usize = 4;
const COPY_BATCH: usize = 4096;

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub account_nodes: u64,
    pub storage_nodes: u64,
    pub accounts: u64,
    /// Persistent state id after cutover; zero when interrupted before it.
    pub state_id: u64,
    pub interrupted: bool,
    pub elapsed: Duration,
}

pub struct Migrator {
    store: Arc<dyn KeyValueStore>,
    history: Arc<dyn HistoryLog>,
    jobs: usize,
    batch_size: usize,
    interrupt: Arc<AtomicBool>,
}

impl Migrator {
    pub fn new(store: Arc<dyn KeyValueStore>, history: Arc<dyn HistoryLog>) -> Self {
        Self {
            store,
            history,
            jobs: DEFAULT_JOBS,
            batch_size: COPY_BATCH,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Worker count for the storage-trie copy phase.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Migrate the head state rooted at `root` from the hash scheme to the
    /// path scheme.
    pub fn run(&self, root: Hash) -> Result<MigrationReport, MaintError> {
        let started = Instant::now();
        require_scheme(self.store.as_ref(), Scheme::Hash)?;
        info!(root = %hex32(&root), jobs = self.jobs, "scheme migration started");

        let mut report = MigrationReport::default();

        // Phase 1: account trie, collecting storage roots for phase 2.
        let mut owners: Vec<(KeyHash, Hash)> = Vec::new();
        let mut batch = WriteBatch::new();
        for visited in TrieWalker::account(self.store.as_ref(), Scheme::Hash, root) {
            let visited = visited?;
            schema::stage_node(&mut batch, Scheme::Path, &visited.reference, &visited.blob);
            report.account_nodes += 1;
            if let Some((key, blob)) = visited.leaf {
                report.accounts += 1;
                let account = Account::decode_full(&blob)?;
                if !account.has_empty_storage() {
                    owners.push((key, account.storage_root));
                }
            }
            if batch.len() >= self.batch_size {
                self.store.write(std::mem::take(&mut batch))?;
                if self.interrupt.load(Ordering::Relaxed) {
                    return Ok(self.finish_interrupted(report, started));
                }
            }
        }
        self.store.write(batch)?;
        info!(
            nodes = report.account_nodes,
            storage_tries = owners.len(),
            "account trie copied"
        );

        // Phase 2: storage tries, sharded by owning account.
        if !owners.is_empty() {
            let shard_size = owners.len().div_ceil(self.jobs);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .map_err(|e| MaintError::Pool(e.to_string()))?;
            let store = self.store.as_ref();
            let interrupt = self.interrupt.as_ref();
            let batch_size = self.batch_size;
            let shards: Result<Vec<(u64, bool)>, MaintError> = pool.install(|| {
                owners
                    .par_chunks(shard_size)
                    .map(|shard| copy_storage_shard(store, shard, batch_size, interrupt))
                    .collect()
            });
            for (nodes, interrupted) in shards? {
                report.storage_nodes += nodes;
                if interrupted {
                    return Ok(self.finish_interrupted(report, started));
                }
            }
            info!(nodes = report.storage_nodes, "storage tries copied");
        }

        // Cutover. From here the path copy is complete; drop the originals
        // and make the new layout authoritative.
        report.state_id = schema::bump_state_id(self.store.as_ref())?;
        self.history.reset_offset(report.state_id)?;
        let mut batch = WriteBatch::new();
        for (key, _) in self.store.iter_prefix(schema::NODE_HASH_PREFIX, &[])? {
            batch.delete(key);
            if batch.len() >= COPY_BATCH {
                self.store.write(std::mem::take(&mut batch))?;
            }
        }
        self.store.write(batch)?;
        schema::write_scheme(self.store.as_ref(), Scheme::Path)?;

        report.elapsed = started.elapsed();
        info!(
            accounts = report.accounts,
            account_nodes = report.account_nodes,
            storage_nodes = report.storage_nodes,
            state_id = report.state_id,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "scheme migration complete"
        );
        Ok(report)
    }

    fn finish_interrupted(
        &self,
        mut report: MigrationReport,
        started: Instant,
    ) -> MigrationReport {
        report.interrupted = true;
        report.elapsed = started.elapsed();
        info!(
            account_nodes = report.account_nodes,
            storage_nodes = report.storage_nodes,
            "migration interrupted before cutover, store unchanged"
        );
        report
    }
}

/// Copy one shard of storage tries under path-scheme keys. Returns the
/// node count and whether an interrupt stopped the shard early.
fn copy_storage_shard(
    store: &dyn KeyValueStore,
    shard: &[(KeyHash, Hash)],
    batch_size: usize,
    interrupt: &AtomicBool,
) -> Result<(u64, bool), MaintError> {
    let mut nodes = 0u64;
    let mut batch = WriteBatch::new();
    for (owner, storage_root) in shard {
        for visited in TrieWalker::storage(store, Scheme::Hash, *owner, *storage_root) {
            let visited = visited?;
            schema::stage_node(&mut batch, Scheme::Path, &visited.reference, &visited.blob);
            nodes += 1;
            if batch.len() >= batch_size {
                store.write(std::mem::take(&mut batch))?;
                if interrupt.load(Ordering::Relaxed) {
                    return Ok((nodes, true));
                }
            }
        }
    }
    store.write(batch)?;
    Ok((nodes, interrupt.load(Ordering::Relaxed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::traverse_state;
    use sediment_trie::adapters::{MemoryHistoryLog, MemoryStore};
    use sediment_trie::builder::{commit_state, StorageMap};
    use sediment_types::keccak256;
    use std::collections::BTreeMap;

    fn seed(store: &MemoryStore) -> (Hash, BTreeMap<KeyHash, Account>) {
        schema::write_scheme(store, Scheme::Hash).unwrap();
        let mut accounts = BTreeMap::new();
        let mut storages = BTreeMap::new();
        for i in 0..16u8 {
            let key = keccak256(&[b'm', i]);
            accounts.insert(key, Account::with_balance(i as u64 + 1));
            if i % 2 == 0 {
                let mut slots = StorageMap::new();
                slots.insert(keccak256(&[i, 0]), vec![i + 1]);
                storages.insert(key, slots);
            }
        }
        let (root, finalized) =
            commit_state(store, Scheme::Hash, &accounts, &storages).expect("commit");
        (root, finalized)
    }

    fn enumerate(store: &MemoryStore, scheme: Scheme, root: Hash) -> Vec<(KeyHash, Account)> {
        TrieWalker::account(store, scheme, root)
            .filter_map(|r| r.unwrap().leaf)
            .map(|(k, blob)| (k, Account::decode_full(&blob).unwrap()))
            .collect()
    }

    #[test]
    fn test_migration_preserves_state_under_path_scheme() {
        let store = Arc::new(MemoryStore::new());
        let (root, _) = seed(&store);
        let before = enumerate(&store, Scheme::Hash, root);
        let history = Arc::new(MemoryHistoryLog::new());

        let report = Migrator::new(Arc::clone(&store) as _, Arc::clone(&history) as _)
            .with_jobs(3)
            .run(root)
            .expect("migrate");
        assert!(!report.interrupted);
        assert_eq!(report.accounts, 16);

        assert_eq!(
            schema::read_scheme(store.as_ref()).unwrap(),
            Some(Scheme::Path)
        );
        let after = enumerate(&store, Scheme::Path, root);
        assert_eq!(before, after, "account enumeration must survive migration");
        assert!(traverse_state(store.as_ref(), Scheme::Path, root).is_ok());
    }

    #[test]
    fn test_migration_drops_hash_scheme_nodes() {
        let store = Arc::new(MemoryStore::new());
        let (root, _) = seed(&store);
        let history = Arc::new(MemoryHistoryLog::new());
        Migrator::new(Arc::clone(&store) as _, history)
            .run(root)
            .expect("migrate");

        let leftover = store
            .iter_prefix(schema::NODE_HASH_PREFIX, &[])
            .unwrap()
            .count();
        assert_eq!(leftover, 0, "old layout must be fully removed");
    }

    #[test]
    fn test_migration_bumps_state_id_and_resets_history() {
        let store = Arc::new(MemoryStore::new());
        let (root, _) = seed(&store);
        let history = Arc::new(MemoryHistoryLog::new());
        let before = schema::read_state_id(store.as_ref()).unwrap();

        let report = Migrator::new(Arc::clone(&store) as _, Arc::clone(&history) as _)
            .run(root)
            .expect("migrate");
        assert!(report.state_id > before);
        assert_eq!(history.offset(), report.state_id);
    }

    #[test]
    fn test_interrupted_migration_leaves_hash_scheme_intact() {
        let store = Arc::new(MemoryStore::new());
        let (root, _) = seed(&store);
        let history = Arc::new(MemoryHistoryLog::new());

        let flag = Arc::new(AtomicBool::new(true));
        let report = Migrator::new(Arc::clone(&store) as _, Arc::clone(&history) as _)
            .with_batch_size(2)
            .with_interrupt(Arc::clone(&flag))
            .run(root)
            .expect("interrupted migrate");
        assert!(report.interrupted);
        assert_eq!(
            schema::read_scheme(store.as_ref()).unwrap(),
            Some(Scheme::Hash),
            "interrupted migration must not flip the scheme"
        );
        assert!(traverse_state(store.as_ref(), Scheme::Hash, root).is_ok());
        assert_eq!(history.offset(), 0, "cutover must not have run");

        // Rerunning without the flag completes the migration.
        flag.store(false, Ordering::Relaxed);
        let resumed = Migrator::new(Arc::clone(&store) as _, Arc::clone(&history) as _)
            .run(root)
            .expect("resumed migrate");
        assert!(!resumed.interrupted);
        assert_eq!(
            schema::read_scheme(store.as_ref()).unwrap(),
            Some(Scheme::Path)
        );
        assert!(traverse_state(store.as_ref(), Scheme::Path, root).is_ok());
    }

    #[test]
    fn test_migration_refuses_path_scheme_store() {
        let store = Arc::new(MemoryStore::new());
        let (root, _) = seed(&store);
        let history = Arc::new(MemoryHistoryLog::new());
        Migrator::new(Arc::clone(&store) as _, Arc::clone(&history) as _)
            .run(root)
            .expect("first migration");

        let again = Migrator::new(Arc::clone(&store) as _, history).run(root);
        assert!(matches!(again, Err(MaintError::SchemeMismatch { .. })));
    }
}
