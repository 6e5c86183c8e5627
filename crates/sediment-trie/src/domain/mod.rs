pub mod errors;
pub mod nibbles;
pub mod node;

pub use errors::*;
pub use nibbles::*;
pub use node::*;
