//! RocksDB implementation of the node store port, used by the admin CLI.

use crate::ports::{BatchOp, KeyValueStore, StoreError, WriteBatch};
use rocksdb::{Direction, IteratorMode, Options, DB};
use std::path::Path;
use tracing::info;

pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open (or create) a database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).map_err(|e| StoreError::Backend(e.to_string()))?;
        info!(path = %path.display(), "node store opened");
        Ok(Self { db })
    }
}

impl KeyValueStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.db
            .get(key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db
            .put(key, value)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.db
            .delete(key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut inner = rocksdb::WriteBatch::default();
        for op in batch.ops {
            match op {
                BatchOp::Put(key, value) => inner.put(key, value),
                BatchOp::Delete(key) => inner.delete(key),
            }
        }
        self.db
            .write(inner)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn iter_prefix(
        &self,
        prefix: &[u8],
        start: &[u8],
    ) -> Result<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + Send + '_>, StoreError> {
        let mut from = prefix.to_vec();
        from.extend_from_slice(start);
        let prefix = prefix.to_vec();
        let iter = self
            .db
            .iterator(IteratorMode::From(&from, Direction::Forward))
            .map_while(Result::ok)
            .take_while(move |(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k.to_vec(), v.to_vec()));
        Ok(Box::new(iter))
    }
}
