//! # Dangling Storage Checker
//!
//! Flat storage entries are only meaningful under an existing flat account
//! entry. An account deletion that failed to take its slots with it leaves
//! "dangling" storage: invisible to normal reads but corrupting iteration
//! and regeneration. The checker scans every storage entry, confirms the
//! owning account entry exists, and reports every offender at once so one
//! repair pass can fix them all. It never deletes anything itself.

use crate::errors::MaintError;
use sediment_trie::ports::KeyValueStore;
use sediment_trie::schema;
use sediment_types::{hex32, Hash};
use std::time::{Duration, Instant};
use tracing::{error, info};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(8);

#[derive(Debug, Default)]
pub struct DanglingReport {
    /// Distinct accounts that own at least one storage entry.
    pub accounts_checked: u64,
    pub slots_scanned: u64,
    pub elapsed: Duration,
}

/// Scan all flat storage for entries without an owning account entry.
///
/// Returns `Err(DanglingStorage)` carrying every offending account hash;
/// a clean store returns the scan counts.
pub fn check_dangling_storage(store: &dyn KeyValueStore) -> Result<DanglingReport, MaintError> {
    let started = Instant::now();
    let mut last_log = Instant::now();
    let mut report = DanglingReport::default();
    let mut dangling: Vec<Hash> = Vec::new();
    let mut current: Option<Hash> = None;

    for (key, _) in store.iter_prefix(schema::SNAP_STORAGE_PREFIX, &[])? {
        let suffix = &key[schema::SNAP_STORAGE_PREFIX.len()..];
        if suffix.len() != 64 {
            continue;
        }
        report.slots_scanned += 1;
        let mut owner = [0u8; 32];
        owner.copy_from_slice(&suffix[..32]);

        // Entries are prefix-ordered, so each owner shows up contiguously.
        if current != Some(owner) {
            current = Some(owner);
            report.accounts_checked += 1;
            if store.get(&schema::snap_account_key(&owner))?.is_none() {
                error!(account = %hex32(&owner), "storage entries with no account entry");
                dangling.push(owner);
            }
        }

        if last_log.elapsed() >= PROGRESS_INTERVAL {
            last_log = Instant::now();
            info!(
                accounts = report.accounts_checked,
                slots = report.slots_scanned,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "dangling storage scan progress"
            );
        }
    }

    report.elapsed = started.elapsed();
    if !dangling.is_empty() {
        return Err(MaintError::DanglingStorage(dangling));
    }
    info!(
        accounts = report.accounts_checked,
        slots = report.slots_scanned,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "no dangling storage found"
    );
    Ok(report)
}
