mod lmdb;
mod memory;
mod traits;

pub use lmdb::LmdbKeyValueStore;
pub use memory::MemoryKeyValueStore;
pub use traits::{KeyValueStore, KvCommand, PipelineResult, StoredValue};
