//! Offline maintenance flows over a populated store: prune, verify,
//! dangling-storage audit, and the hash-to-path migration.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{commit_world, init_store};
    use sediment_maint::{
        check_dangling_storage, traverse_raw_state, traverse_state, verify_state, MaintError,
        Migrator, Pruner,
    };
    use sediment_snapshot::{Generator, GeneratorState, Lookup, SnapshotTree};
    use sediment_trie::adapters::{MemoryHistoryLog, MemoryStore, RocksStore};
    use sediment_trie::schema::{self, Scheme};
    use sediment_trie::{KeyValueStore, TrieWalker};
    use sediment_types::{keccak256, Account, KeyHash};
    use std::sync::Arc;

    fn enumerate_accounts(
        store: &dyn KeyValueStore,
        scheme: Scheme,
        root: sediment_types::Hash,
    ) -> Vec<(KeyHash, Account)> {
        TrieWalker::account(store, scheme, root)
            .filter_map(|r| r.unwrap().leaf)
            .map(|(k, blob)| (k, Account::decode_full(&blob).unwrap()))
            .collect()
    }

    #[test]
    fn test_prune_keeps_target_and_genesis_traversable() {
        let store = Arc::new(MemoryStore::new());
        let genesis = init_store(store.as_ref(), 21, 30);
        // An intermediate state that nothing references after pruning.
        let middle = commit_world(store.as_ref(), 22, 30);
        let target = commit_world(store.as_ref(), 23, 30);
        assert_ne!(middle.root, target.root);

        let report = Pruner::new(Arc::clone(&store) as _)
            .with_bloom_size_mb(8)
            .run(target.root)
            .expect("prune");
        assert!(report.nodes_deleted > 0, "middle state should be swept");
        assert!(!report.interrupted);

        // Both retained roots must survive a full digest-checking traversal.
        traverse_raw_state(store.as_ref(), Scheme::Hash, target.root)
            .expect("target intact after prune");
        traverse_raw_state(store.as_ref(), Scheme::Hash, genesis.root)
            .expect("genesis intact after prune");
    }

    #[test]
    fn test_prune_leaves_generated_snapshot_readable() {
        let store = Arc::new(MemoryStore::new());
        let world = init_store(store.as_ref(), 24, 40);
        Generator::new(Arc::clone(&store) as _, Scheme::Hash)
            .run(world.root)
            .expect("generate");

        Pruner::new(Arc::clone(&store) as _)
            .with_bloom_size_mb(8)
            .run(world.root)
            .expect("prune");

        let tree = SnapshotTree::open(Arc::clone(&store) as _).unwrap();
        for (key, expected) in &world.accounts {
            let got = tree.account(world.root, key).unwrap();
            assert_eq!(got, Lookup::Confirmed(expected.clone()));
        }
    }

    #[test]
    fn test_verify_state_accepts_generated_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let world = init_store(store.as_ref(), 25, 35);
        let report = Generator::new(Arc::clone(&store) as _, Scheme::Hash)
            .run(world.root)
            .expect("generate");
        assert_eq!(report.state, GeneratorState::Done);

        let tree = SnapshotTree::open(store).unwrap();
        let verified = verify_state(&tree, world.root).expect("snapshot matches trie");
        assert_eq!(verified.accounts as usize, world.accounts.len());
    }

    #[test]
    fn test_dangling_storage_audit_end_to_end() {
        let store = Arc::new(MemoryStore::new());
        let world = init_store(store.as_ref(), 26, 30);
        Generator::new(Arc::clone(&store) as _, Scheme::Hash)
            .run(world.root)
            .expect("generate");
        check_dangling_storage(store.as_ref()).expect("generated snapshot is consistent");

        // A storage entry whose owner has no account entry.
        let orphan = keccak256(b"orphan owner");
        let mut key = b"S".to_vec();
        key.extend_from_slice(&orphan);
        key.extend_from_slice(&keccak256(b"slot"));
        store.put(&key, b"value").unwrap();

        match check_dangling_storage(store.as_ref()) {
            Err(MaintError::DanglingStorage(owners)) => assert_eq!(owners, vec![orphan]),
            other => panic!("expected dangling storage error, got {other:?}"),
        }
    }

    #[test]
    fn test_migration_preserves_state_and_advances_state_id() {
        let store = Arc::new(MemoryStore::new());
        let world = init_store(store.as_ref(), 27, 45);
        let before = enumerate_accounts(store.as_ref(), Scheme::Hash, world.root);
        let id_before = schema::read_state_id(store.as_ref()).unwrap();

        let history = Arc::new(MemoryHistoryLog::new());
        let report = Migrator::new(Arc::clone(&store) as _, Arc::clone(&history) as _)
            .with_jobs(2)
            .run(world.root)
            .expect("migrate");
        assert!(!report.interrupted);

        assert_eq!(
            schema::read_scheme(store.as_ref()).unwrap(),
            Some(Scheme::Path)
        );
        assert!(report.state_id > id_before, "migration must advance the state id");
        assert_eq!(history.offset(), report.state_id);

        let after = enumerate_accounts(store.as_ref(), Scheme::Path, world.root);
        assert_eq!(before, after, "account enumeration changed across migration");
        traverse_raw_state(store.as_ref(), Scheme::Path, world.root)
            .expect("migrated state intact");
    }

    #[test]
    fn test_full_lifecycle_on_rocksdb() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn KeyValueStore> =
            Arc::new(RocksStore::open(dir.path()).expect("open rocksdb"));

        let world = init_store(store.as_ref(), 28, 25);
        let generated = Generator::new(Arc::clone(&store), Scheme::Hash)
            .run(world.root)
            .expect("generate");
        assert_eq!(generated.state, GeneratorState::Done);

        let tree = SnapshotTree::open(Arc::clone(&store)).unwrap();
        verify_state(&tree, world.root).expect("verify");
        check_dangling_storage(store.as_ref()).expect("dangling audit");

        Pruner::new(Arc::clone(&store))
            .with_bloom_size_mb(8)
            .run(world.root)
            .expect("prune");
        traverse_state(store.as_ref(), Scheme::Hash, world.root).expect("traverse after prune");

        let history = Arc::new(MemoryHistoryLog::new());
        Migrator::new(Arc::clone(&store), history)
            .run(world.root)
            .expect("migrate");
        traverse_state(store.as_ref(), Scheme::Path, world.root)
            .expect("traverse after migration");
    }
}
