//! In-memory `KeyValueStore` backing the hot tier in tests and single-node
//! deployments (spec.md §4.6 "Tier-0: Hot Memory").

use super::traits::{KeyValueStore, KvCommand, PipelineResult, StoredValue};
use async_trait::async_trait;
use pai_core::{MemoryError, PaiResult};
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Entry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Instant::now() >= at).unwrap_or(false)
    }
}

/// Thread-safe in-memory key-value store, namespace-agnostic: callers are
/// responsible for the `pai:hot:*` prefix convention.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn glob_to_regex(pattern: &str) -> Option<Regex> {
        let mut escaped = regex::escape(pattern);
        escaped = escaped.replace(r"\*", ".*").replace(r"\?", ".");
        Regex::new(&format!("^{escaped}$")).ok()
    }
}

fn kv_store_err(reason: impl Into<String>) -> pai_core::PaiError {
    pai_core::PaiError::Memory(MemoryError::KeyValueStore { reason: reason.into() })
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> PaiResult<Option<String>> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        if let Some(entry) = entries.get(key) {
            if entry.is_expired() {
                entries.remove(key);
                return Ok(None);
            }
            return Ok(entry.value.as_str().map(|s| s.to_string()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ex: Option<i64>) -> PaiResult<()> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        entries.insert(
            key.to_string(),
            Entry {
                value: StoredValue::Str(value.to_string()),
                expires_at: ex.map(|secs| Instant::now() + Duration::from_secs(secs.max(0) as u64)),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> PaiResult<bool> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        Ok(entries.remove(key).is_some())
    }

    async fn expire(&self, key: &str, ttl_secs: i64) -> PaiResult<bool> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs.max(0) as u64));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn scan(&self, pattern: &str) -> PaiResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| kv_store_err("poisoned lock"))?;
        let re = Self::glob_to_regex(pattern);
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .filter(|(k, _)| re.as_ref().map(|r| r.is_match(k)).unwrap_or(true))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> PaiResult<()> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: StoredValue::Hash(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            StoredValue::Hash(map) => {
                map.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(kv_store_err(format!("{key} is not a hash"))),
        }
    }

    async fn hget(&self, key: &str, field: &str) -> PaiResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| kv_store_err("poisoned lock"))?;
        match entries.get(key).map(|e| &e.value) {
            Some(StoredValue::Hash(map)) => Ok(map.get(field).cloned()),
            _ => Ok(None),
        }
    }

    async fn hgetall(&self, key: &str) -> PaiResult<HashMap<String, String>> {
        let entries = self.entries.read().map_err(|_| kv_store_err("poisoned lock"))?;
        match entries.get(key).map(|e| &e.value) {
            Some(StoredValue::Hash(map)) => Ok(map.clone()),
            _ => Ok(HashMap::new()),
        }
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> PaiResult<i64> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: StoredValue::Hash(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            StoredValue::Hash(map) => {
                let current = map.get(field).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
                let next = current + delta;
                map.insert(field.to_string(), next.to_string());
                Ok(next)
            }
            _ => Err(kv_store_err(format!("{key} is not a hash"))),
        }
    }

    async fn lpush(&self, key: &str, value: &str) -> PaiResult<i64> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: StoredValue::List(VecDeque::new()),
            expires_at: None,
        });
        match &mut entry.value {
            StoredValue::List(list) => {
                list.push_front(value.to_string());
                Ok(list.len() as i64)
            }
            _ => Err(kv_store_err(format!("{key} is not a list"))),
        }
    }

    async fn rpush(&self, key: &str, value: &str) -> PaiResult<i64> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: StoredValue::List(VecDeque::new()),
            expires_at: None,
        });
        match &mut entry.value {
            StoredValue::List(list) => {
                list.push_back(value.to_string());
                Ok(list.len() as i64)
            }
            _ => Err(kv_store_err(format!("{key} is not a list"))),
        }
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> PaiResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| kv_store_err("poisoned lock"))?;
        let list = match entries.get(key).map(|e| &e.value) {
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
        Ok(list.iter().skip(start as usize).take((stop - start) as usize).cloned().collect())
    }

    async fn lrem(&self, key: &str, value: &str) -> PaiResult<i64> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(StoredValue::List(list)) => {
                let before = list.len();
                list.retain(|v| v != value);
                Ok((before - list.len()) as i64)
            }
            _ => Ok(0),
        }
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> PaiResult<()> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        if let Some(Entry { value: StoredValue::List(list), .. }) = entries.get_mut(key) {
            let len = list.len() as i64;
            let normalize = |idx: i64| -> i64 { if idx < 0 { (len + idx).max(0) } else { idx.min(len) } };
            let start = normalize(start);
            let stop = (normalize(stop) + 1).min(len);
            let trimmed: VecDeque<String> = if start >= stop {
                VecDeque::new()
            } else {
                list.iter().skip(start as usize).take((stop - start) as usize).cloned().collect()
            };
            *list = trimmed;
        }
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> PaiResult<bool> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: StoredValue::Set(HashSet::new()),
            expires_at: None,
        });
        match &mut entry.value {
            StoredValue::Set(set) => Ok(set.insert(member.to_string())),
            _ => Err(kv_store_err(format!("{key} is not a set"))),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> PaiResult<bool> {
        let mut entries = self.entries.write().map_err(|_| kv_store_err("poisoned lock"))?;
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(StoredValue::Set(set)) => Ok(set.remove(member)),
            _ => Ok(false),
        }
    }

    async fn smembers(&self, key: &str) -> PaiResult<HashSet<String>> {
        let entries = self.entries.read().map_err(|_| kv_store_err("poisoned lock"))?;
        match entries.get(key).map(|e| &e.value) {
            Some(StoredValue::Set(set)) => Ok(set.clone()),
            _ => Ok(HashSet::new()),
        }
    }

    async fn publish(&self, _topic: &str, _payload: &str) -> PaiResult<i64> {
        // The pub/sub side of the key-value store contract is superseded by
        // the dedicated Bus (pai-events) in this deployment; kept here only
        // to satisfy the spec's contract shape for callers that expect it.
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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryKeyValueStore::new();
        store.set("pai:hot:a", "1", None).await.unwrap();
        assert_eq!(store.get("pai:hot:a").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn expired_key_reads_as_missing() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "v", Some(0)).await.unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hincrby_accumulates() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.hincrby("counters", "hits", 3).await.unwrap(), 3);
        assert_eq!(store.hincrby("counters", "hits", 2).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn list_push_range_trim() {
        let store = MemoryKeyValueStore::new();
        store.rpush("task:1:traces", "a").await.unwrap();
        store.rpush("task:1:traces", "b").await.unwrap();
        store.rpush("task:1:traces", "c").await.unwrap();
        assert_eq!(store.lrange("task:1:traces", 0, -1).await.unwrap(), vec!["a", "b", "c"]);
        store.ltrim("task:1:traces", 1, -1).await.unwrap();
        assert_eq!(store.lrange("task:1:traces", 0, -1).await.unwrap(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn set_add_remove_members() {
        let store = MemoryKeyValueStore::new();
        assert!(store.sadd("s", "x").await.unwrap());
        assert!(!store.sadd("s", "x").await.unwrap());
        assert!(store.smembers("s").await.unwrap().contains("x"));
        assert!(store.srem("s", "x").await.unwrap());
    }

    #[tokio::test]
    async fn scan_matches_glob() {
        let store = MemoryKeyValueStore::new();
        store.set("task:1:trace:OBSERVE", "x", None).await.unwrap();
        store.set("task:1:trace:THINK", "x", None).await.unwrap();
        store.set("other", "x", None).await.unwrap();
        let mut matched = store.scan("task:1:trace:*").await.unwrap();
        matched.sort();
        assert_eq!(matched, vec!["task:1:trace:OBSERVE", "task:1:trace:THINK"]);
    }

    #[tokio::test]
    async fn pipeline_runs_commands_in_order() {
        let store = MemoryKeyValueStore::new();
        let results = store
            .pipeline(vec![
                KvCommand::Set { key: "a".into(), value: "1".into(), ex: None },
                KvCommand::Get { key: "a".into() },
            ])
            .await
            .unwrap();
        assert_eq!(results[1].as_ref().unwrap(), &Some("1".to_string()));
    }
}
