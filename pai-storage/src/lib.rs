//! PAI Storage - the Vector Store, Key-Value Store, and File Archive (spec.md
//! §2 rows D/E/F).

mod archive;
mod kv;
mod vector;

pub use archive::ColdArchive;
pub use kv::{KeyValueStore, KvCommand, LmdbKeyValueStore, MemoryKeyValueStore, PipelineResult, StoredValue};
pub use vector::{metadata_matches, MemoryVectorStore, VectorHit, VectorRecord, VectorStore};
