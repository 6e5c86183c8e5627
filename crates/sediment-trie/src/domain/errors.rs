//! Trie-level error taxonomy.

use super::node::NodeRef;
use sediment_types::rlp::RlpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrieError {
    /// A referenced node is absent from the store. Fatal for every
    /// traversal; mutating jobs must abort before their write phase.
    #[error("missing trie node ({0})")]
    MissingNode(NodeRef),

    /// Stored bytes do not hash to the claimed digest. Raised only by the
    /// raw verifier, which is the one consumer that rechecks digests.
    #[error("trie node hash mismatch ({0})")]
    HashMismatch(NodeRef),

    /// An account references code the store does not have.
    #[error("missing contract code 0x{}", hex::encode(.code_hash))]
    MissingCode { code_hash: [u8; 32] },

    /// Node blob that does not decode to a known node shape.
    #[error("undecodable trie node")]
    InvalidNodeShape,

    #[error("rlp: {0}")]
    Rlp(#[from] RlpError),

    #[error("store: {0}")]
    Store(#[from] crate::ports::StoreError),
}
