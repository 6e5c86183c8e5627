//! Shared fixtures: deterministic synthetic worlds committed into a store.

use rand::{Rng, SeedableRng};
use sediment_trie::builder::{commit_state, StorageMap};
use sediment_trie::ports::KeyValueStore;
use sediment_trie::schema::{self, Scheme};
use sediment_types::{keccak256, Account, Hash, KeyHash};
use std::collections::BTreeMap;

/// Fully committed synthetic state: what went in, and where it landed.
pub struct World {
    pub root: Hash,
    pub accounts: BTreeMap<KeyHash, Account>,
    pub storages: BTreeMap<KeyHash, StorageMap>,
}

/// Commit a pseudo-random world of `count` accounts. Every third account
/// gets a storage trie, every fifth gets code. Deterministic per seed.
pub fn commit_world(store: &dyn KeyValueStore, seed: u64, count: u32) -> World {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut accounts = BTreeMap::new();
    let mut storages = BTreeMap::new();

    for i in 0..count {
        let key = keccak256(&[seed.to_be_bytes().as_slice(), &i.to_be_bytes()].concat());
        let mut account = Account::with_balance(rng.gen_range(1..1_000_000));
        account.nonce = rng.gen_range(0..100);

        if i % 5 == 0 {
            let code: Vec<u8> = (0..rng.gen_range(8..64)).map(|_| rng.gen()).collect();
            account.code_hash = keccak256(&code);
            schema::write_code(store, &account.code_hash, &code).expect("write code");
        }
        if i % 3 == 0 {
            let mut slots = StorageMap::new();
            for s in 0..rng.gen_range(1..6u8) {
                let slot = keccak256(&[key.as_slice(), &[s]].concat());
                let value: Vec<u8> = (0..rng.gen_range(1..16)).map(|_| rng.gen()).collect();
                slots.insert(slot, value);
            }
            storages.insert(key, slots);
        }
        accounts.insert(key, account);
    }

    let (root, finalized) =
        commit_state(store, Scheme::Hash, &accounts, &storages).expect("commit world");
    World {
        root,
        accounts: finalized,
        storages,
    }
}

/// Commit a world and stamp the store with the hash scheme marker and a
/// genesis root, the way a freshly initialized node looks.
pub fn init_store(store: &dyn KeyValueStore, seed: u64, count: u32) -> World {
    schema::write_scheme(store, Scheme::Hash).expect("write scheme");
    let world = commit_world(store, seed, count);
    schema::write_genesis_root(store, &world.root).expect("write genesis root");
    world
}
