//! # sediment-snapshot
//!
//! Layered flat-state snapshot over the node store.
//!
//! ## Role in System
//!
//! - **Layer stack**: one persisted disk layer plus in-memory diff layers,
//!   one per recent block, linked by state root
//! - **Merge iterators**: ordered account/slot streams across the whole
//!   stack, youngest layer winning per key
//! - **Generator**: background job that rebuilds the disk layer from the
//!   trie, resumable across restarts through a persisted marker
//!
//! Reads are tri-state. A hit in any layer is authoritative, a miss inside
//! the generated key range is an authoritative absence, and a miss beyond
//! the generator's watermark means the caller must fall back to the trie.

pub mod errors;
pub mod generator;
pub mod iterator;
pub mod layers;

pub use errors::SnapshotError;
pub use generator::{Generator, GeneratorMarker, GeneratorReport, GeneratorState};
pub use iterator::{AccountIterator, StorageIterator};
pub use layers::{Lookup, SnapshotTree};
