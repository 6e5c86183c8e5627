//! # Sediment Test Suite
//!
//! Unified test crate for flows that cross crate boundaries:
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── snapshot_flows.rs     # trie <-> snapshot equivalence, generator
//!     └── maintenance_flows.rs  # prune, verify, migrate end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sediment-tests
//! cargo test -p sediment-tests integration::
//! ```

#![allow(dead_code)]

pub mod integration;
