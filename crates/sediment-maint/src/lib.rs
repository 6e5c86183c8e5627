//! # sediment-maint
//!
//! Offline maintenance jobs for the state store.
//!
//! ## Role in System
//!
//! - **Reachability pruner**: drop every hash-scheme node unreachable from
//!   the chosen target root and the genesis root, bloom-bounded
//! - **Integrity verifier**: account-level and node-level traversals, plus
//!   snapshot-against-trie root verification
//! - **Dangling-storage checker**: flag flat storage left behind by a
//!   missing account entry
//! - **Scheme migrator**: rewrite a hash-addressed store into the
//!   path-addressed layout
//!
//! Every job here is fail-closed: a read error during analysis aborts the
//! run before anything is deleted or rewritten.

pub mod bloom;
pub mod dangling;
pub mod errors;
pub mod migrate;
pub mod pruner;
pub mod verifier;

pub use bloom::ReachabilityFilter;
pub use dangling::{check_dangling_storage, DanglingReport};
pub use errors::MaintError;
pub use migrate::{Migrator, MigrationReport};
pub use pruner::{prune_all, PruneReport, Pruner};
pub use verifier::{traverse_raw_state, traverse_state, verify_state, TraversalReport};
