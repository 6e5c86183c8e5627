//! # Snapshot Generator
//!
//! ## The Problem
//!
//! The disk layer has to be rebuilt from the trie whenever the snapshot is
//! missing or was invalidated, but a full account-trie walk takes hours on
//! a grown state. The node restarts; the walk must not start over.
//!
//! ## The Solution
//!
//! Walk the account trie in key order, writing slim accounts and raw slots
//! into the disk layer in batches. After every batch the generator persists
//! a marker recording exactly how far it got: the last account written and,
//! when a storage trie was split across batches, the last slot of that
//! account. A restart resumes strictly after the marker. Interruption is
//! cooperative and checked at batch boundaries only, so the marker on disk
//! is always consistent with the written entries.
//!
//! The marker doubles as the disk layer's coverage watermark: reads at or
//! below it trust the flat state, reads beyond it fall back to the trie.
//! Diff layers sit above the disk layer, so in-flight generation never
//! shadows newer block data.

use crate::errors::SnapshotError;
use crate::iterator::key_after;
use sediment_trie::ports::{KeyValueStore, WriteBatch};
use sediment_trie::schema::{self, Scheme};
use sediment_trie::TrieWalker;
use sediment_types::{hex32, rlp, Account, Hash, KeyHash};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const DEFAULT_BATCH_SIZE: usize = 4096;
const PROGRESS_INTERVAL: Duration = Duration::from_secs(8);

/// Where a (possibly interrupted) generation run stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorState {
    Idle,
    Running,
    Done,
    Aborted,
}

/// Resume point persisted after every batch.
///
/// Absent marker plus a recorded snapshot root means generation finished;
/// absent marker and no root means it never started.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeneratorMarker {
    /// Last account hash whose flat entry was written.
    pub last_key: Option<Hash>,
    /// The account walk finished; only the final commit remained.
    pub accounts_done: bool,
    /// Set when a storage trie was split across batches: the owning
    /// account and the last slot written.
    pub storage_cursor: Option<(Hash, Hash)>,
}

impl GeneratorMarker {
    fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::Marker(e.to_string()))
    }

    fn decode(raw: &[u8]) -> Result<Self, SnapshotError> {
        bincode::deserialize(raw).map_err(|e| SnapshotError::Marker(e.to_string()))
    }
}

// =============================================================================
// COVERAGE
// =============================================================================

/// How much of the key space the disk layer can answer for.
pub enum Coverage {
    /// Generation never ran; the disk layer answers for nothing.
    None,
    /// Generation is underway; covered up to the marker.
    Partial(GeneratorMarker),
    /// Generation completed; every miss is an authoritative absence.
    Full,
}

impl Coverage {
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, SnapshotError> {
        if let Some(raw) = schema::read_generator_marker(store)? {
            return Ok(Coverage::Partial(GeneratorMarker::decode(&raw)?));
        }
        Ok(if schema::read_snapshot_root(store)?.is_some() {
            Coverage::Full
        } else {
            Coverage::None
        })
    }

    pub fn covers_account(&self, key: &KeyHash) -> bool {
        match self {
            Coverage::None => false,
            Coverage::Full => true,
            Coverage::Partial(marker) => {
                marker.accounts_done || marker.last_key.is_some_and(|watermark| *key <= watermark)
            }
        }
    }

    pub fn covers_storage(&self, account: &KeyHash, slot: &KeyHash) -> bool {
        match self {
            Coverage::None => false,
            Coverage::Full => true,
            Coverage::Partial(marker) => {
                // A pending cursor limits coverage inside its own account.
                if let Some((owner, last_slot)) = marker.storage_cursor {
                    if *account == owner {
                        return *slot <= last_slot;
                    }
                }
                if marker.accounts_done {
                    return true;
                }
                match marker.last_key {
                    Some(watermark) => *account <= watermark,
                    None => false,
                }
            }
        }
    }
}

// =============================================================================
// GENERATOR
// =============================================================================

#[derive(Debug, Default)]
pub struct GeneratorReport {
    pub accounts: u64,
    pub slots: u64,
    pub batches: u64,
    pub state: GeneratorState,
    pub elapsed: Duration,
}

impl Default for GeneratorState {
    fn default() -> Self {
        GeneratorState::Idle
    }
}

impl GeneratorReport {
    pub fn interrupted(&self) -> bool {
        self.state == GeneratorState::Aborted
    }
}

pub struct Generator {
    store: Arc<dyn KeyValueStore>,
    scheme: Scheme,
    batch_size: usize,
    interrupt: Arc<AtomicBool>,
}

impl Generator {
    pub fn new(store: Arc<dyn KeyValueStore>, scheme: Scheme) -> Self {
        Self {
            store,
            scheme,
            batch_size: DEFAULT_BATCH_SIZE,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Handle for requesting a cooperative stop.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Generate (or resume generating) the disk layer for `root`.
    ///
    /// Returns with `state == Aborted` on interruption; the persisted
    /// marker then makes the next call continue where this one stopped.
    pub fn run(&self, root: Hash) -> Result<GeneratorReport, SnapshotError> {
        let started = Instant::now();
        let mut report = GeneratorReport {
            state: GeneratorState::Running,
            ..Default::default()
        };
        let mut marker = match schema::read_generator_marker(self.store.as_ref())? {
            Some(raw) => {
                let marker = GeneratorMarker::decode(&raw)?;
                info!(
                    resume_from = %marker.last_key.as_ref().map(hex32).unwrap_or_default(),
                    "resuming snapshot generation"
                );
                marker
            }
            None => {
                info!(root = %hex32(&root), "starting snapshot generation");
                GeneratorMarker::default()
            }
        };
        let mut batch = WriteBatch::new();
        let mut last_log = Instant::now();

        // Finish the storage trie a previous run stopped inside of.
        if let Some((owner, last_slot)) = marker.storage_cursor {
            let storage_root = self.stored_storage_root(&owner)?;
            let resume = key_after(&last_slot);
            let interrupted = self.generate_storage(
                owner,
                storage_root,
                resume,
                &mut marker,
                &mut batch,
                &mut report,
                &mut last_log,
            )?;
            if interrupted {
                return Ok(self.finish_aborted(report, started));
            }
        }

        if !marker.accounts_done {
            let resume = marker.last_key.and_then(|key| key_after(&key));
            let exhausted = marker.last_key.is_some() && resume.is_none();
            if !exhausted {
                let mut walker = TrieWalker::account(self.store.as_ref(), self.scheme, root);
                if let Some(key) = resume {
                    walker = walker.starting_at(&key);
                }
                for visited in walker {
                    let Some((key, blob)) = visited?.leaf else {
                        continue;
                    };
                    let account = Account::decode_full(&blob)?;
                    batch.put(schema::snap_account_key(&key), account.encode_slim());
                    report.accounts += 1;
                    marker.last_key = Some(key);
                    marker.storage_cursor = None;

                    if !account.has_empty_storage() {
                        let interrupted = self.generate_storage(
                            key,
                            account.storage_root,
                            None,
                            &mut marker,
                            &mut batch,
                            &mut report,
                            &mut last_log,
                        )?;
                        if interrupted {
                            return Ok(self.finish_aborted(report, started));
                        }
                    }
                    if self.flush_if_full(&mut batch, &marker, &mut report)?
                        && self.interrupt.load(Ordering::Relaxed)
                    {
                        return Ok(self.finish_aborted(report, started));
                    }
                    self.maybe_log(&report, &mut last_log, started);
                }
            }
            marker.accounts_done = true;
        }

        // Final commit: remaining entries, then flip the snapshot to live.
        self.flush(&mut batch, &marker, &mut report)?;
        schema::write_snapshot_root(self.store.as_ref(), &root)?;
        schema::delete_generator_marker(self.store.as_ref())?;

        report.state = GeneratorState::Done;
        report.elapsed = started.elapsed();
        info!(
            accounts = report.accounts,
            slots = report.slots,
            batches = report.batches,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "snapshot generation complete"
        );
        Ok(report)
    }

    /// Stream one storage trie into the batch. Returns true when the run
    /// was interrupted mid-trie (cursor persisted).
    #[allow(clippy::too_many_arguments)]
    fn generate_storage(
        &self,
        owner: KeyHash,
        storage_root: Hash,
        resume: Option<KeyHash>,
        marker: &mut GeneratorMarker,
        batch: &mut WriteBatch,
        report: &mut GeneratorReport,
        last_log: &mut Instant,
    ) -> Result<bool, SnapshotError> {
        let mut walker =
            TrieWalker::storage(self.store.as_ref(), self.scheme, owner, storage_root);
        if let Some(key) = resume {
            walker = walker.starting_at(&key);
        }
        let started = *last_log;
        for visited in walker {
            let Some((slot, blob)) = visited?.leaf else {
                continue;
            };
            let mut reader = rlp::Reader::new(&blob);
            let value = reader.next_bytes()?.to_vec();
            batch.put(schema::snap_storage_key(&owner, &slot), value);
            report.slots += 1;
            marker.storage_cursor = Some((owner, slot));

            if self.flush_if_full(batch, marker, report)?
                && self.interrupt.load(Ordering::Relaxed)
            {
                return Ok(true);
            }
            self.maybe_log(report, last_log, started);
        }
        marker.storage_cursor = None;
        Ok(false)
    }

    fn stored_storage_root(&self, owner: &KeyHash) -> Result<Hash, SnapshotError> {
        let blob = self
            .store
            .get(&schema::snap_account_key(owner))?
            .ok_or_else(|| {
                SnapshotError::Marker(format!(
                    "storage cursor references unwritten account {}",
                    hex32(owner)
                ))
            })?;
        Ok(Account::decode_slim(&blob)?.storage_root)
    }

    fn flush_if_full(
        &self,
        batch: &mut WriteBatch,
        marker: &GeneratorMarker,
        report: &mut GeneratorReport,
    ) -> Result<bool, SnapshotError> {
        if batch.len() < self.batch_size {
            return Ok(false);
        }
        self.flush(batch, marker, report)?;
        Ok(true)
    }

    fn flush(
        &self,
        batch: &mut WriteBatch,
        marker: &GeneratorMarker,
        report: &mut GeneratorReport,
    ) -> Result<(), SnapshotError> {
        if !batch.is_empty() {
            let pending = std::mem::take(batch);
            self.store.write(pending)?;
            report.batches += 1;
        }
        // The marker always trails the data it describes.
        schema::write_generator_marker(self.store.as_ref(), &marker.encode()?)?;
        Ok(())
    }

    fn finish_aborted(&self, mut report: GeneratorReport, started: Instant) -> GeneratorReport {
        report.state = GeneratorState::Aborted;
        report.elapsed = started.elapsed();
        info!(
            accounts = report.accounts,
            slots = report.slots,
            "snapshot generation interrupted, marker persisted"
        );
        report
    }

    fn maybe_log(&self, report: &GeneratorReport, last_log: &mut Instant, started: Instant) {
        if last_log.elapsed() < PROGRESS_INTERVAL {
            return;
        }
        *last_log = Instant::now();
        info!(
            accounts = report.accounts,
            slots = report.slots,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot generation progress"
        );
    }
}
