//! Node store port: the byte-addressable contract consumed by the trie,
//! the snapshot layers, and every maintenance job.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// One pending mutation inside a write batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Ordered set of mutations applied atomically.
///
/// Jobs that rewrite many nodes stage them here so a crash never leaves a
/// node half-written.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete(key.into()));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Byte-addressable key/value store with ordered prefix iteration.
///
/// The compaction and durability internals behind this trait are external
/// collaborators; everything in this workspace goes through these six
/// operations.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Apply a batch atomically.
    fn write(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Iterate `(key, value)` pairs whose key starts with `prefix`, in
    /// ascending key order, beginning at `prefix ++ start`.
    fn iter_prefix(
        &self,
        prefix: &[u8],
        start: &[u8],
    ) -> Result<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + Send + '_>, StoreError>;
}
