//! Tier-0 Hot Memory (spec.md §4.6): JSON blobs keyed under `pai:hot:*`, and
//! per-task execution traces, both TTL'd in the key-value store.

use pai_core::{MemoryError, Phase};
use pai_core::{PaiError, PaiResult, TaskId};
use pai_storage::KeyValueStore;
use serde_json::Value;
use std::sync::Arc;

fn kv_err(reason: impl Into<String>) -> PaiError {
    PaiError::Memory(MemoryError::KeyValueStore { reason: reason.into() })
}

pub struct HotMemory {
    kv: Arc<dyn KeyValueStore>,
    ttl_secs: i64,
}

impl HotMemory {
    pub fn new(kv: Arc<dyn KeyValueStore>, ttl_secs: u64) -> Self {
        Self { kv, ttl_secs: ttl_secs as i64 }
    }

    fn hot_key(key: &str) -> String {
        format!("pai:hot:{key}")
    }

    fn trace_key(task_id: TaskId, phase: Phase) -> String {
        format!("task:{task_id}:trace:{}", phase.as_db_str())
    }

    fn trace_list_key(task_id: TaskId) -> String {
        format!("task:{task_id}:traces")
    }

    pub async fn store_hot(&self, key: &str, value: &Value) -> PaiResult<()> {
        self.store_hot_with_ttl(key, value, self.ttl_secs).await
    }

    /// Like `store_hot`, but with an explicit TTL in seconds instead of the
    /// tier's default (spec.md §4.4 heartbeat key: "a 60-second TTL").
    pub async fn store_hot_with_ttl(&self, key: &str, value: &Value, ttl_secs: i64) -> PaiResult<()> {
        let serialized = serde_json::to_string(value).map_err(|e| kv_err(e.to_string()))?;
        self.kv.set(&Self::hot_key(key), &serialized, Some(ttl_secs)).await
    }

    pub async fn get_hot(&self, key: &str) -> PaiResult<Option<Value>> {
        let Some(raw) = self.kv.get(&Self::hot_key(key)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| kv_err(e.to_string()))
    }

    /// Stores `data` at `task:<id>:trace:<phase>` and appends the phase name
    /// to the `task:<id>:traces` list, resetting both TTLs (spec.md §4.6).
    pub async fn store_task_trace(&self, task_id: TaskId, phase: Phase, data: &Value) -> PaiResult<()> {
        let serialized = serde_json::to_string(data).map_err(|e| kv_err(e.to_string()))?;
        let trace_key = Self::trace_key(task_id, phase);
        self.kv.set(&trace_key, &serialized, Some(self.ttl_secs)).await?;

        let list_key = Self::trace_list_key(task_id);
        self.kv.rpush(&list_key, phase.as_db_str()).await?;
        self.kv.expire(&list_key, self.ttl_secs).await?;
        Ok(())
    }

    /// Returns the stored trace for `phase`, if any (used by `flush` to
    /// check for a VERIFY trace before promoting it to warm memory).
    pub async fn get_task_trace(&self, task_id: TaskId, phase: Phase) -> PaiResult<Option<Value>> {
        let Some(raw) = self.kv.get(&Self::trace_key(task_id, phase)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| kv_err(e.to_string()))
    }
}
