//! Key-value store contract (spec.md §6 "Key-value store contract").

use async_trait::async_trait;
use pai_core::PaiResult;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// A stored value's shape: strings, hashes, lists, and sets share one
/// keyspace, matching the way the spec's contract overlays Redis-style
/// commands on a single namespaced key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoredValue {
    Str(String),
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
    Set(std::collections::HashSet<String>),
}

impl StoredValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoredValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Result of a `pipeline` batch: one outcome per submitted command, in order.
pub type PipelineResult = Vec<PaiResult<Option<String>>>;

/// A single deferred command for `pipeline`.
#[derive(Debug, Clone)]
pub enum KvCommand {
    Set { key: String, value: String, ex: Option<i64> },
    Get { key: String },
    Delete { key: String },
    HIncrBy { key: String, field: String, delta: i64 },
}

/// Low-latency string/hash/list/set store with TTL and atomic counters
/// (spec.md §2 row E). Hosts hot memory and short-lived agent state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PaiResult<Option<String>>;
    async fn set(&self, key: &str, value: &str, ex: Option<i64>) -> PaiResult<()>;
    async fn delete(&self, key: &str) -> PaiResult<bool>;
    async fn expire(&self, key: &str, ttl_secs: i64) -> PaiResult<bool>;
    async fn scan(&self, pattern: &str) -> PaiResult<Vec<String>>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> PaiResult<()>;
    async fn hget(&self, key: &str, field: &str) -> PaiResult<Option<String>>;
    async fn hgetall(&self, key: &str) -> PaiResult<HashMap<String, String>>;
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> PaiResult<i64>;

    async fn lpush(&self, key: &str, value: &str) -> PaiResult<i64>;
    async fn rpush(&self, key: &str, value: &str) -> PaiResult<i64>;
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> PaiResult<Vec<String>>;
    async fn lrem(&self, key: &str, value: &str) -> PaiResult<i64>;
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> PaiResult<()>;

    async fn sadd(&self, key: &str, member: &str) -> PaiResult<bool>;
    async fn srem(&self, key: &str, member: &str) -> PaiResult<bool>;
    async fn smembers(&self, key: &str) -> PaiResult<std::collections::HashSet<String>>;

    async fn publish(&self, topic: &str, payload: &str) -> PaiResult<i64>;

    /// Execute a batch of commands without intermediate round-trips.
    async fn pipeline(&self, commands: Vec<KvCommand>) -> PaiResult<PipelineResult>;

    /// Best-effort durability trigger (spec.md §4.8 `flush`).
    async fn bgsave(&self) -> PaiResult<()>;
}
