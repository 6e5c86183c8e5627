//! # sediment-trie
//!
//! Hash-linked trie model and node store plumbing.
//!
//! ## Role in System
//!
//! - **Node model**: the Patricia trie node kinds with byte-exact RLP
//!   encoding and decoding
//! - **Node store port**: the narrow key/value contract every maintenance
//!   job reads and writes through, plus the on-disk key schema for both the
//!   hash-addressed and path-addressed schemes
//! - **Builder**: commit a complete account/storage mapping into the store
//!   and obtain its root (trie population during block processing is the
//!   integrator's job; the builder backs generation, verification and tests)
//! - **Walker**: iterative depth-first traversal from any root, the shared
//!   engine under the generator, pruner, verifier and migrator

pub mod builder;
pub mod domain;
pub mod ports;
pub mod schema;
pub mod walker;

pub mod adapters;

pub use builder::commit_state;
pub use domain::*;
pub use ports::*;
pub use schema::Scheme;
pub use walker::{TrieWalker, VisitedNode};
