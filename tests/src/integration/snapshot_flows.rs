//! Trie/snapshot equivalence and generator lifecycle, end to end.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{commit_world, init_store};
    use sediment_snapshot::{
        AccountIterator, Generator, GeneratorState, Lookup, SnapshotTree, StorageIterator,
    };
    use sediment_trie::adapters::MemoryStore;
    use sediment_trie::schema::Scheme;
    use sediment_trie::{KeyValueStore, TrieWalker};
    use sediment_types::{keccak256, Account, KeyHash, ZERO_HASH};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn generated_world(seed: u64, count: u32) -> (Arc<MemoryStore>, crate::integration::fixtures::World) {
        let store = Arc::new(MemoryStore::new());
        let world = init_store(store.as_ref(), seed, count);
        let report = Generator::new(Arc::clone(&store) as _, Scheme::Hash)
            .run(world.root)
            .expect("generate");
        assert_eq!(report.state, GeneratorState::Done);
        (store, world)
    }

    #[test]
    fn test_snapshot_reads_match_trie_for_every_account_and_slot() {
        let (store, world) = generated_world(11, 60);
        let tree = SnapshotTree::open(Arc::clone(&store) as _).unwrap();

        for (key, expected) in &world.accounts {
            let got = tree
                .account(world.root, key)
                .unwrap()
                .confirmed()
                .expect("account present in snapshot");
            assert_eq!(&got, expected, "snapshot and trie disagree on an account");
        }
        for (owner, slots) in &world.storages {
            for (slot, value) in slots {
                let got = tree.storage(world.root, owner, slot).unwrap();
                assert_eq!(got, Lookup::Confirmed(value.clone()));
            }
        }
    }

    #[test]
    fn test_absent_key_is_authoritatively_deleted_after_generation() {
        let (store, world) = generated_world(12, 20);
        let tree = SnapshotTree::open(store).unwrap();
        let absent = keccak256(b"no such account");
        assert_eq!(tree.account(world.root, &absent).unwrap(), Lookup::Deleted);
    }

    #[test]
    fn test_account_iterator_matches_trie_enumeration() {
        let (store, world) = generated_world(13, 50);
        let tree = SnapshotTree::open(Arc::clone(&store) as _).unwrap();

        let from_trie: Vec<(KeyHash, Account)> =
            TrieWalker::account(store.as_ref(), Scheme::Hash, world.root)
                .filter_map(|r| r.unwrap().leaf)
                .map(|(k, blob)| (k, Account::decode_full(&blob).unwrap()))
                .collect();
        let from_snapshot: Vec<(KeyHash, Account)> =
            AccountIterator::new(&tree, world.root, &ZERO_HASH)
                .unwrap()
                .map(|r| r.unwrap())
                .collect();
        assert_eq!(from_trie, from_snapshot);
    }

    #[test]
    fn test_storage_iterator_matches_committed_slots() {
        let (store, world) = generated_world(14, 30);
        let tree = SnapshotTree::open(store).unwrap();

        for (owner, slots) in &world.storages {
            let iterated: Vec<(KeyHash, Vec<u8>)> =
                StorageIterator::new(&tree, world.root, owner, &ZERO_HASH)
                    .unwrap()
                    .map(|r| r.unwrap())
                    .collect();
            let expected: Vec<(KeyHash, Vec<u8>)> =
                slots.iter().map(|(k, v)| (*k, v.clone())).collect();
            assert_eq!(iterated, expected, "slot enumeration diverged");
        }
    }

    #[test]
    fn test_interrupted_generation_resumed_equals_uninterrupted() {
        // Reference: one uninterrupted run.
        let reference_store = Arc::new(MemoryStore::new());
        let world = init_store(reference_store.as_ref(), 15, 40);
        Generator::new(Arc::clone(&reference_store) as _, Scheme::Hash)
            .run(world.root)
            .expect("reference run");

        // Same world, interrupted once then resumed.
        let store = Arc::new(MemoryStore::new());
        let world2 = init_store(store.as_ref(), 15, 40);
        assert_eq!(world.root, world2.root, "fixture must be deterministic");

        let generator =
            Generator::new(Arc::clone(&store) as _, Scheme::Hash).with_batch_size(8);
        generator.interrupt_flag().store(true, Ordering::Relaxed);
        let first = generator.run(world2.root).expect("interrupted run");
        assert_eq!(first.state, GeneratorState::Aborted);

        let resumed = Generator::new(Arc::clone(&store) as _, Scheme::Hash)
            .with_batch_size(8)
            .run(world2.root)
            .expect("resumed run");
        assert_eq!(resumed.state, GeneratorState::Done);
        assert_eq!(
            first.accounts + resumed.accounts,
            40,
            "no account may be generated twice"
        );

        // Byte-identical flat state.
        for prefix in [b"A".as_slice(), b"S".as_slice()] {
            let reference: Vec<(Vec<u8>, Vec<u8>)> = reference_store
                .iter_prefix(prefix, &[])
                .unwrap()
                .collect();
            let actual: Vec<(Vec<u8>, Vec<u8>)> =
                store.iter_prefix(prefix, &[]).unwrap().collect();
            assert_eq!(reference, actual, "resumed flat state diverged");
        }
    }

    #[test]
    fn test_diff_layers_shadow_generated_disk_state() {
        let (store, world) = generated_world(16, 25);
        let tree = SnapshotTree::open(store).unwrap();

        let (victim, original) = world.accounts.iter().next().expect("non-empty world");
        let new_root = keccak256(b"child block");
        let mut accounts = std::collections::HashMap::new();
        let mut updated = original.clone();
        updated.nonce += 1;
        accounts.insert(*victim, Some(updated.clone()));
        tree.update(world.root, new_root, accounts, Default::default())
            .unwrap();

        let at_child = tree.account(new_root, victim).unwrap().confirmed().unwrap();
        assert_eq!(at_child, updated);
        let at_parent = tree.account(world.root, victim).unwrap().confirmed().unwrap();
        assert_eq!(&at_parent, original, "parent root must still see the old value");
    }

    #[test]
    fn test_uncovered_miss_falls_back_to_unknown_before_generation() {
        let store = Arc::new(MemoryStore::new());
        let world = commit_world(store.as_ref(), 17, 10);
        let tree = SnapshotTree::open(store).unwrap();
        // No generator ran: the disk layer is empty and covers nothing.
        let any = world.accounts.keys().next().unwrap();
        assert!(tree.account(tree.disk_root(), any).unwrap().is_unknown());
    }
}
