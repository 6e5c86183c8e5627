//! Historical log port.
//!
//! The append-only block history lives outside this workspace. Jobs consult
//! it for the head and canonical roots, and bulk rewrites reconcile its
//! offset against the persistent state id when they finish.

use sediment_types::Hash;

use super::store::StoreError;

pub trait HistoryLog: Send + Sync {
    /// Root of the current chain head.
    fn head_root(&self) -> Result<Option<Hash>, StoreError>;

    /// Canonical state root at a block number, if retained.
    fn canonical_root(&self, number: u64) -> Result<Option<Hash>, StoreError>;

    /// Align the log's offset with a new persistent state id after a bulk
    /// rewrite of the node store.
    fn reset_offset(&self, state_id: u64) -> Result<(), StoreError>;
}
