//! Maintenance job error domain.

use sediment_snapshot::SnapshotError;
use sediment_trie::schema::Scheme;
use sediment_trie::{StoreError, TrieError};
use sediment_types::rlp::RlpError;
use sediment_types::Hash;

#[derive(Debug, thiserror::Error)]
pub enum MaintError {
    /// The job requires a specific node keying scheme. Checked before any
    /// mutation.
    #[error("store scheme is {found:?}, this operation requires {expected}")]
    SchemeMismatch {
        expected: Scheme,
        found: Option<Scheme>,
    },

    /// Flat storage entries whose owning account entry is missing. Carries
    /// every offending account hash, never just the first.
    #[error("{} account(s) with dangling storage entries", .0.len())]
    DanglingStorage(Vec<Hash>),

    /// Snapshot-derived state root does not match the trie root.
    #[error(
        "state root mismatch: expected 0x{}, snapshot yields 0x{}",
        hex::encode(.expected),
        hex::encode(.computed)
    )]
    RootMismatch { expected: Hash, computed: Hash },

    /// Pruning needs a genesis root and none is recorded.
    #[error("no genesis root recorded in the store")]
    NoGenesisRoot,

    #[error("worker pool setup failed: {0}")]
    Pool(String),

    #[error(transparent)]
    Trie(#[from] TrieError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("decode failed: {0}")]
    Rlp(#[from] RlpError),
}
