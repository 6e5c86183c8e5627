pub mod history_log;
pub mod memory_store;
pub mod rocks_store;

pub use history_log::{MemoryHistoryLog, StoreHistoryLog};
pub use memory_store::MemoryStore;
pub use rocks_store::RocksStore;
