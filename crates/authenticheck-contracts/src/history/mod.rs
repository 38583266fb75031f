mod backend;
mod store;

pub use backend::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use store::{HistoryStore, HISTORY_KEY};
