//! LMDB-backed `KeyValueStore`, for deployments that want the hot tier to
//! survive a process restart. Uses the `heed` crate (LMDB bindings), mirroring
//! the memory-mapped, single-database layout of the teacher's cache backend.

use super::traits::{KeyValueStore, KvCommand, PipelineResult, StoredValue};
use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use pai_core::{MemoryError, PaiError, PaiResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

fn kv_store_err(reason: impl Into<String>) -> PaiError {
    PaiError::Memory(MemoryError::KeyValueStore { reason: reason.into() })
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StoredEntry {
    value: StoredValue,
    expires_at_unix_ms: Option<i64>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        match self.expires_at_unix_ms {
            Some(at) => chrono::Utc::now().timestamp_millis() >= at,
            None => false,
        }
    }
}

/// LMDB-backed key-value store. A single unnamed database maps keys to a
/// JSON-serialized `StoredEntry` so that strings, hashes, lists, and sets
/// all share one keyspace, matching the spec's contract.
pub struct LmdbKeyValueStore {
    env: Env,
    db: Database<Str, Bytes>,
}

impl LmdbKeyValueStore {
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> PaiResult<Self> {
        std::fs::create_dir_all(&path).map_err(|e| kv_store_err(e.to_string()))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| kv_store_err(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(|e| kv_store_err(e.to_string()))?;
        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| kv_store_err(e.to_string()))?;
        wtxn.commit().map_err(|e| kv_store_err(e.to_string()))?;

        Ok(Self { env, db })
    }

    fn read_entry(&self, key: &str) -> PaiResult<Option<StoredEntry>> {
        let rtxn = self.env.read_txn().map_err(|e| kv_store_err(e.to_string()))?;
        let raw = self.db.get(&rtxn, key).map_err(|e| kv_store_err(e.to_string()))?;
        match raw {
            Some(bytes) => {
                let entry: StoredEntry =
                    serde_json::from_slice(bytes).map_err(|e| kv_store_err(e.to_string()))?;
                if entry.is_expired() {
                    Ok(None)
                } else {
                    Ok(Some(entry))
                }
            }
            None => Ok(None),
        }
    }

    fn write_entry(&self, key: &str, entry: &StoredEntry) -> PaiResult<()> {
        let mut wtxn = self.env.write_txn().map_err(|e| kv_store_err(e.to_string()))?;
        let bytes = serde_json::to_vec(entry).map_err(|e| kv_store_err(e.to_string()))?;
        self.db.put(&mut wtxn, key, &bytes).map_err(|e| kv_store_err(e.to_string()))?;
        wtxn.commit().map_err(|e| kv_store_err(e.to_string()))
    }

    fn mutate<F>(&self, key: &str, default: StoredValue, f: F) -> PaiResult<()>
    where
        F: FnOnce(&mut StoredValue) -> PaiResult<()>,
    {
        let mut entry = self.read_entry(key)?.unwrap_or(StoredEntry {
            value: default,
            expires_at_unix_ms: None,
        });
        f(&mut entry.value)?;
        self.write_entry(key, &entry)
    }
}

#[async_trait]
impl KeyValueStore for LmdbKeyValueStore {
    async fn get(&self, key: &str) -> PaiResult<Option<String>> {
        Ok(self.read_entry(key)?.and_then(|e| e.value.as_str().map(|s| s.to_string())))
    }

    async fn set(&self, key: &str, value: &str, ex: Option<i64>) -> PaiResult<()> {
        let expires_at_unix_ms = ex.map(|secs| chrono::Utc::now().timestamp_millis() + secs.max(0) * 1000);
        self.write_entry(
            key,
            &StoredEntry { value: StoredValue::Str(value.to_string()), expires_at_unix_ms },
        )
    }

    async fn delete(&self, key: &str) -> PaiResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(|e| kv_store_err(e.to_string()))?;
        let existed = self.db.delete(&mut wtxn, key).map_err(|e| kv_store_err(e.to_string()))?;
        wtxn.commit().map_err(|e| kv_store_err(e.to_string()))?;
        Ok(existed)
    }

    async fn expire(&self, key: &str, ttl_secs: i64) -> PaiResult<bool> {
        match self.read_entry(key)? {
            Some(mut entry) => {
                entry.expires_at_unix_ms =
                    Some(chrono::Utc::now().timestamp_millis() + ttl_secs.max(0) * 1000);
                self.write_entry(key, &entry)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn scan(&self, pattern: &str) -> PaiResult<Vec<String>> {
        let re = {
            let mut escaped = regex::escape(pattern);
            escaped = escaped.replace(r"\*", ".*").replace(r"\?", ".");
            regex::Regex::new(&format!("^{escaped}$")).ok()
        };
        let rtxn = self.env.read_txn().map_err(|e| kv_store_err(e.to_string()))?;
        let mut keys = Vec::new();
        for item in self.db.iter(&rtxn).map_err(|e| kv_store_err(e.to_string()))? {
            let (key, bytes) = item.map_err(|e| kv_store_err(e.to_string()))?;
            let entry: StoredEntry = match serde_json::from_slice(bytes) {
                Ok(e) => e,
                Err(_) => continue,
            };
            if entry.is_expired() {
                continue;
            }
            if re.as_ref().map(|r| r.is_match(key)).unwrap_or(true) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> PaiResult<()> {
        self.mutate(key, StoredValue::Hash(HashMap::new()), |v| match v {
            StoredValue::Hash(map) => {
                map.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(kv_store_err(format!("{key} is not a hash"))),
        })
    }

    async fn hget(&self, key: &str, field: &str) -> PaiResult<Option<String>> {
        match self.read_entry(key)?.map(|e| e.value) {
            Some(StoredValue::Hash(map)) => Ok(map.get(field).cloned()),
            _ => Ok(None),
        }
    }

    async fn hgetall(&self, key: &str) -> PaiResult<HashMap<String, String>> {
        match self.read_entry(key)?.map(|e| e.value) {
            Some(StoredValue::Hash(map)) => Ok(map),
            _ => Ok(HashMap::new()),
        }
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> PaiResult<i64> {
        let mut result = 0i64;
        self.mutate(key, StoredValue::Hash(HashMap::new()), |v| match v {
            StoredValue::Hash(map) => {
                let current = map.get(field).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
                result = current + delta;
                map.insert(field.to_string(), result.to_string());
                Ok(())
            }
            _ => Err(kv_store_err(format!("{key} is not a hash"))),
        })?;
        Ok(result)
    }

    async fn lpush(&self, key: &str, value: &str) -> PaiResult<i64> {
        let mut result = 0i64;
        self.mutate(key, StoredValue::List(VecDeque::new()), |v| match v {
            StoredValue::List(list) => {
                list.push_front(value.to_string());
                result = list.len() as i64;
                Ok(())
            }
            _ => Err(kv_store_err(format!("{key} is not a list"))),
        })?;
        Ok(result)
    }

    async fn rpush(&self, key: &str, value: &str) -> PaiResult<i64> {
        let mut result = 0i64;
        self.mutate(key, StoredValue::List(VecDeque::new()), |v| match v {
            StoredValue::List(list) => {
                list.push_back(value.to_string());
                result = list.len() as i64;
                Ok(())
            }
            _ => Err(kv_store_err(format!("{key} is not a list"))),
        })?;
        Ok(result)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> PaiResult<Vec<String>> {
        let list = match self.read_entry(key)?.map(|e| e.value) {
            Some(StoredValue::List(list)) => list,
            _ => return Ok(Vec::new()),
        };
        let len = list.len() as i64;
        let normalize = |idx: i64| -> i64 { if idx < 0 { (len + idx).max(0) } else { idx.min(len) } };
        let start = normalize(start);
        let stop = (normalize(stop) + 1).min(len);
        if start >= stop {
            return Ok(Vec::new());
        }
        Ok(list.into_iter().skip(start as usize).take((stop - start) as usize).collect())
    }

    async fn lrem(&self, key: &str, value: &str) -> PaiResult<i64> {
        let mut removed = 0i64;
        if let Some(mut entry) = self.read_entry(key)? {
            if let StoredValue::List(list) = &mut entry.value {
                let before = list.len();
                list.retain(|v| v != value);
                removed = (before - list.len()) as i64;
                self.write_entry(key, &entry)?;
            }
        }
        Ok(removed)
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> PaiResult<()> {
        if let Some(mut entry) = self.read_entry(key)? {
            if let StoredValue::List(list) = &mut entry.value {
                let len = list.len() as i64;
                let normalize = |idx: i64| -> i64 { if idx < 0 { (len + idx).max(0) } else { idx.min(len) } };
                let start = normalize(start);
                let stop = (normalize(stop) + 1).min(len);
                *list = if start >= stop {
                    VecDeque::new()
                } else {
                    list.iter().skip(start as usize).take((stop - start) as usize).cloned().collect()
                };
                self.write_entry(key, &entry)?;
            }
        }
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> PaiResult<bool> {
        let mut inserted = false;
        self.mutate(key, StoredValue::Set(HashSet::new()), |v| match v {
            StoredValue::Set(set) => {
                inserted = set.insert(member.to_string());
                Ok(())
            }
            _ => Err(kv_store_err(format!("{key} is not a set"))),
        })?;
        Ok(inserted)
    }

    async fn srem(&self, key: &str, member: &str) -> PaiResult<bool> {
        let mut removed = false;
        if let Some(mut entry) = self.read_entry(key)? {
            if let StoredValue::Set(set) = &mut entry.value {
                removed = set.remove(member);
                self.write_entry(key, &entry)?;
            }
        }
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> PaiResult<HashSet<String>> {
        match self.read_entry(key)?.map(|e| e.value) {
            Some(StoredValue::Set(set)) => Ok(set),
            _ => Ok(HashSet::new()),
        }
    }

    async fn publish(&self, _topic: &str, _payload: &str) -> PaiResult<i64> {
        Ok(0)
    }

    async fn pipeline(&self, commands: Vec<KvCommand>) -> PaiResult<PipelineResult> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let outcome: PaiResult<Option<String>> = match command {
                KvCommand::Set { key, value, ex } => self.set(&key, &value, ex).await.map(|_| None),
                KvCommand::Get { key } => self.get(&key).await,
                KvCommand::Delete { key } => self.delete(&key).await.map(|_| None),
                KvCommand::HIncrBy { key, field, delta } => {
                    self.hincrby(&key, &field, delta).await.map(|v| Some(v.to_string()))
                }
            };
            results.push(outcome);
        }
        Ok(results)
    }

    async fn bgsave(&self) -> PaiResult<()> {
        self.env.force_sync().map_err(|e| kv_store_err(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbKeyValueStore::new(dir.path(), 16).unwrap();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn hash_ops_persist_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbKeyValueStore::new(dir.path(), 16).unwrap();
        store.hset("h", "f1", "a").await.unwrap();
        store.hset("h", "f2", "b").await.unwrap();
        let all = store.hgetall("h").await.unwrap();
        assert_eq!(all.get("f1"), Some(&"a".to_string()));
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn expired_key_reads_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbKeyValueStore::new(dir.path(), 16).unwrap();
        store.set("k", "v", Some(0)).await.unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_push_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbKeyValueStore::new(dir.path(), 16).unwrap();
        store.rpush("l", "a").await.unwrap();
        store.rpush("l", "b").await.unwrap();
        assert_eq!(store.lrange("l", 0, -1).await.unwrap(), vec!["a", "b"]);
    }
}
