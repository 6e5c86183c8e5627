//! Snapshot error domain.

use sediment_trie::{StoreError, TrieError};
use sediment_types::rlp::RlpError;
use sediment_types::Hash;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The layer was flattened or discarded under the reader. Local to the
    /// operation; callers re-resolve the layer and retry.
    #[error("stale snapshot layer 0x{}", hex::encode(.0))]
    StaleLayer(Hash),

    /// No layer in the stack carries this root.
    #[error("unknown snapshot layer 0x{}", hex::encode(.0))]
    UnknownLayer(Hash),

    /// A layer with this root already exists in the stack.
    #[error("duplicate snapshot layer 0x{}", hex::encode(.0))]
    DuplicateLayer(Hash),

    /// A diff layer must attach to an existing layer.
    #[error("parent layer 0x{} not found for new layer 0x{}", hex::encode(.parent), hex::encode(.child))]
    UnknownParent { parent: Hash, child: Hash },

    /// The disk layer is the flatten target, never the flatten source.
    #[error("operation not permitted on the disk layer")]
    DiskLayer,

    /// Persisted generator marker failed to decode.
    #[error("corrupt generator marker: {0}")]
    Marker(String),

    #[error("account decode failed: {0}")]
    Rlp(#[from] RlpError),

    #[error(transparent)]
    Trie(#[from] TrieError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
