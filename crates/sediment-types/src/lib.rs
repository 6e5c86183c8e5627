//! # sediment-types
//!
//! Primitive types shared by every Sediment crate.
//!
//! ## Role in System
//!
//! - **Hashes and constants**: 32-byte hashes, the well-known empty-trie and
//!   empty-code digests
//! - **Account record**: the canonical trie encoding and the space-saving
//!   "slim" snapshot encoding, with lossless translation between the two
//! - **RLP codec**: the byte-exact encoders and decoders everything above
//!   is built on

pub mod account;
pub mod entities;
pub mod rlp;

pub use account::*;
pub use entities::*;
