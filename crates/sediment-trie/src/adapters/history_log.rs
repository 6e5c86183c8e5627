//! History log adapters.
//!
//! `StoreHistoryLog` keeps head/canonical roots and the reconciliation
//! offset inside the node store's meta namespace, which is how the admin
//! CLI sees the chain. `MemoryHistoryLog` is the test fixture.

use crate::ports::{HistoryLog, KeyValueStore, StoreError};
use sediment_types::Hash;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

const META_HEAD_ROOT: &[u8] = b"m:head-root";
const META_HISTORY_OFFSET: &[u8] = b"m:history-offset";
const META_CANONICAL_PREFIX: &[u8] = b"m:canonical:";

/// History log persisted in the node store's meta namespace.
pub struct StoreHistoryLog {
    store: Arc<dyn KeyValueStore>,
}

impl StoreHistoryLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn write_head_root(&self, root: &Hash) -> Result<(), StoreError> {
        self.store.put(META_HEAD_ROOT, root)
    }

    pub fn write_canonical_root(&self, number: u64, root: &Hash) -> Result<(), StoreError> {
        self.store.put(&canonical_key(number), root)
    }

    pub fn offset(&self) -> Result<u64, StoreError> {
        Ok(self
            .store
            .get(META_HISTORY_OFFSET)?
            .filter(|v| v.len() == 8)
            .map(|v| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&v);
                u64::from_be_bytes(buf)
            })
            .unwrap_or(0))
    }
}

impl HistoryLog for StoreHistoryLog {
    fn head_root(&self) -> Result<Option<Hash>, StoreError> {
        Ok(self.store.get(META_HEAD_ROOT)?.and_then(to_hash))
    }

    fn canonical_root(&self, number: u64) -> Result<Option<Hash>, StoreError> {
        Ok(self.store.get(&canonical_key(number))?.and_then(to_hash))
    }

    fn reset_offset(&self, state_id: u64) -> Result<(), StoreError> {
        self.store.put(META_HISTORY_OFFSET, &state_id.to_be_bytes())
    }
}

fn canonical_key(number: u64) -> Vec<u8> {
    let mut key = META_CANONICAL_PREFIX.to_vec();
    key.extend_from_slice(&number.to_be_bytes());
    key
}

fn to_hash(v: Vec<u8>) -> Option<Hash> {
    if v.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&v);
    Some(out)
}

/// In-memory history log for tests.
#[derive(Default)]
pub struct MemoryHistoryLog {
    inner: RwLock<MemoryHistoryInner>,
}

#[derive(Default)]
struct MemoryHistoryInner {
    head: Option<Hash>,
    canonical: BTreeMap<u64, Hash>,
    offset: u64,
}

impl MemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head(&self, root: Hash) {
        if let Ok(mut inner) = self.inner.write() {
            inner.head = Some(root);
        }
    }

    pub fn set_canonical(&self, number: u64, root: Hash) {
        if let Ok(mut inner) = self.inner.write() {
            inner.canonical.insert(number, root);
        }
    }

    pub fn offset(&self) -> u64 {
        self.inner.read().map(|i| i.offset).unwrap_or(0)
    }
}

impl HistoryLog for MemoryHistoryLog {
    fn head_root(&self) -> Result<Option<Hash>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        Ok(inner.head)
    }

    fn canonical_root(&self, number: u64) -> Result<Option<Hash>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        Ok(inner.canonical.get(&number).copied())
    }

    fn reset_offset(&self, state_id: u64) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        inner.offset = state_id;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;

    #[test]
    fn test_store_history_log_roundtrip() {
        let store = Arc::new(MemoryStore::new());
        let log = StoreHistoryLog::new(store);
        assert_eq!(log.head_root().unwrap(), None);

        let root = sediment_types::keccak256(b"head");
        log.write_head_root(&root).unwrap();
        log.write_canonical_root(42, &root).unwrap();

        assert_eq!(log.head_root().unwrap(), Some(root));
        assert_eq!(log.canonical_root(42).unwrap(), Some(root));
        assert_eq!(log.canonical_root(43).unwrap(), None);

        log.reset_offset(9).unwrap();
        assert_eq!(log.offset().unwrap(), 9);
    }

    #[test]
    fn test_memory_history_log_offset() {
        let log = MemoryHistoryLog::new();
        log.set_head([1u8; 32]);
        assert_eq!(log.head_root().unwrap(), Some([1u8; 32]));
        log.reset_offset(3).unwrap();
        assert_eq!(log.offset(), 3);
    }
}
