//! Depth-first trie traversal.
//!
//! `TrieWalker` streams every node of a trie in pre-order, yielding leaves
//! together with their reconstructed 32-byte keys. Children are visited in
//! nibble order, so leaf keys come out in ascending key order. A missing
//! node aborts the walk with the exact reference that failed, which is what
//! the verifiers print.

use crate::domain::{Nibbles, NodeRef, TrieError, TrieNode};
use crate::ports::KeyValueStore;
use crate::schema::{self, Scheme};
use sediment_types::{keccak256, Hash, KeyHash, EMPTY_TRIE_ROOT, ZERO_HASH};

/// One node surfaced by the walker.
pub struct VisitedNode {
    pub reference: NodeRef,
    pub blob: Vec<u8>,
    /// Set for leaf nodes: the reconstructed key and the raw leaf value.
    pub leaf: Option<(KeyHash, Vec<u8>)>,
}

pub struct TrieWalker<'a> {
    store: &'a dyn KeyValueStore,
    scheme: Scheme,
    owner: Hash,
    stack: Vec<NodeRef>,
    start: Option<Nibbles>,
    verify_hashes: bool,
}

impl<'a> TrieWalker<'a> {
    /// Walk the account trie rooted at `root`.
    pub fn account(store: &'a dyn KeyValueStore, scheme: Scheme, root: Hash) -> Self {
        Self::new(store, scheme, ZERO_HASH, root)
    }

    /// Walk the storage trie of `owner` rooted at `root`.
    pub fn storage(store: &'a dyn KeyValueStore, scheme: Scheme, owner: Hash, root: Hash) -> Self {
        Self::new(store, scheme, owner, root)
    }

    fn new(store: &'a dyn KeyValueStore, scheme: Scheme, owner: Hash, root: Hash) -> Self {
        let mut stack = Vec::new();
        if root != EMPTY_TRIE_ROOT {
            stack.push(NodeRef {
                owner,
                path: Nibbles::default(),
                hash: root,
            });
        }
        Self {
            store,
            scheme,
            owner,
            stack,
            start: None,
            verify_hashes: false,
        }
    }

    /// Skip every leaf whose key sorts before `start`, pruning whole
    /// subtrees that cannot reach it. Used to resume interrupted walks.
    pub fn starting_at(mut self, start: &KeyHash) -> Self {
        self.start = Some(Nibbles::from_key(start));
        self
    }

    /// Recompute and check every node digest against its reference.
    pub fn verifying_hashes(mut self) -> Self {
        self.verify_hashes = true;
        self
    }

    /// True when a subtree rooted at `path` ends strictly before the start
    /// key and can be skipped wholesale.
    fn before_start(&self, path: &Nibbles) -> bool {
        let Some(start) = &self.start else {
            return false;
        };
        let bound = path.len().min(start.len());
        path.0.as_slice() < &start.0[..bound]
    }
}

impl Iterator for TrieWalker<'_> {
    type Item = Result<VisitedNode, TrieError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reference = self.stack.pop()?;

        let blob = match schema::require_node(self.store, self.scheme, &reference) {
            Ok(blob) => blob,
            Err(err) => {
                self.stack.clear();
                return Some(Err(err));
            }
        };
        if self.verify_hashes && keccak256(&blob) != reference.hash {
            self.stack.clear();
            return Some(Err(TrieError::HashMismatch(reference)));
        }

        let node = match TrieNode::decode(&blob) {
            Ok(node) => node,
            Err(err) => {
                self.stack.clear();
                return Some(Err(err));
            }
        };

        let mut leaf = None;
        match node {
            TrieNode::Leaf { path, value } => {
                let full = reference.path.join(&path);
                let Some(key) = full.to_key() else {
                    self.stack.clear();
                    return Some(Err(TrieError::InvalidNodeShape));
                };
                let skip = self
                    .start
                    .as_ref()
                    .is_some_and(|start| full.0 < start.0);
                if !skip {
                    leaf = Some((key, value));
                }
            }
            TrieNode::Extension { path, child } => {
                let child_path = reference.path.join(&path);
                if !self.before_start(&child_path) {
                    self.stack.push(NodeRef {
                        owner: self.owner,
                        path: child_path,
                        hash: child,
                    });
                }
            }
            TrieNode::Branch { children } => {
                // Reverse push order keeps the pop order ascending.
                for nibble in (0..16u8).rev() {
                    if let Some(hash) = children[nibble as usize] {
                        let child_path = reference.path.push(nibble);
                        if !self.before_start(&child_path) {
                            self.stack.push(NodeRef {
                                owner: self.owner,
                                path: child_path,
                                hash,
                            });
                        }
                    }
                }
            }
        }

        Some(Ok(VisitedNode {
            reference,
            blob,
            leaf,
        }))
    }
}
