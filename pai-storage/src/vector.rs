//! Vector store contract (spec.md §2 row D, §6 "Vector store contract").
//!
//! Persistent, metadata-filtered nearest-neighbor store keyed by opaque
//! document id. The in-memory implementation embeds query text through an
//! injected `EmbeddingProvider` and ranks by cosine similarity.

use async_trait::async_trait;
use pai_core::{compute_content_hash, EmbeddingProvider, EmbeddingVector, MemoryError, PaiError, PaiResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub metadata: serde_json::Value,
}

fn vector_store_err(reason: impl Into<String>) -> PaiError {
    PaiError::Memory(MemoryError::VectorStore { reason: reason.into() })
}

/// Metadata filter matching: every key in `filter` must be present in
/// `metadata` with an equal value. An absent filter matches everything.
pub fn metadata_matches(metadata: &serde_json::Value, filter: Option<&serde_json::Value>) -> bool {
    let Some(filter) = filter else { return true };
    let Some(filter_obj) = filter.as_object() else { return true };
    let Some(metadata_obj) = metadata.as_object() else { return filter_obj.is_empty() };
    filter_obj.iter().all(|(k, v)| metadata_obj.get(k) == Some(v))
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(
        &self,
        id: Option<String>,
        text: &str,
        metadata: serde_json::Value,
    ) -> PaiResult<String>;

    async fn search(
        &self,
        query: &str,
        limit: usize,
        score_threshold: f32,
        filter: Option<&serde_json::Value>,
    ) -> PaiResult<Vec<VectorHit>>;

    async fn get(&self, id: &str) -> PaiResult<Option<VectorRecord>>;

    async fn scroll(
        &self,
        filter: Option<&serde_json::Value>,
        limit: usize,
        offset: Option<usize>,
    ) -> PaiResult<(Vec<VectorRecord>, Option<usize>)>;

    async fn delete(&self, id: &str) -> PaiResult<bool>;

    async fn delete_batch(&self, ids: &[String]) -> PaiResult<usize>;

    async fn update(
        &self,
        id: &str,
        text: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> PaiResult<()>;
}

struct Stored {
    record: VectorRecord,
    embedding: EmbeddingVector,
}

/// In-memory vector store, suitable for tests and small deployments. Holds
/// insertion order so `scroll` offsets are stable across calls.
pub struct MemoryVectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    records: RwLock<HashMap<String, Stored>>,
    order: RwLock<Vec<String>>,
}

impl MemoryVectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            records: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(
        &self,
        id: Option<String>,
        text: &str,
        metadata: serde_json::Value,
    ) -> PaiResult<String> {
        let embedding = self.embedder.embed(text).await?;
        let id = id.unwrap_or_else(|| hex::encode(compute_content_hash(text.as_bytes())));

        let mut records = self.records.write().map_err(|_| vector_store_err("poisoned lock"))?;
        if !records.contains_key(&id) {
            self.order.write().map_err(|_| vector_store_err("poisoned lock"))?.push(id.clone());
        }
        records.insert(
            id.clone(),
            Stored { record: VectorRecord { id: id.clone(), text: text.to_string(), metadata }, embedding },
        );
        Ok(id)
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        score_threshold: f32,
        filter: Option<&serde_json::Value>,
    ) -> PaiResult<Vec<VectorHit>> {
        let query_embedding = self.embedder.embed(query).await?;
        let records = self.records.read().map_err(|_| vector_store_err("poisoned lock"))?;

        let mut hits: Vec<VectorHit> = records
            .values()
            .filter(|s| metadata_matches(&s.record.metadata, filter))
            .filter_map(|s| {
                let score = query_embedding.cosine_similarity(&s.embedding)?;
                (score >= score_threshold).then_some(VectorHit {
                    id: s.record.id.clone(),
                    score,
                    text: s.record.text.clone(),
                    metadata: s.record.metadata.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get(&self, id: &str) -> PaiResult<Option<VectorRecord>> {
        let records = self.records.read().map_err(|_| vector_store_err("poisoned lock"))?;
        Ok(records.get(id).map(|s| s.record.clone()))
    }

    async fn scroll(
        &self,
        filter: Option<&serde_json::Value>,
        limit: usize,
        offset: Option<usize>,
    ) -> PaiResult<(Vec<VectorRecord>, Option<usize>)> {
        let order = self.order.read().map_err(|_| vector_store_err("poisoned lock"))?;
        let records = self.records.read().map_err(|_| vector_store_err("poisoned lock"))?;
        let offset = offset.unwrap_or(0);

        let matching: Vec<&VectorRecord> = order
            .iter()
            .skip(offset)
            .filter_map(|id| records.get(id))
            .map(|s| &s.record)
            .filter(|r| metadata_matches(&r.metadata, filter))
            .collect();

        let next_offset = if matching.len() > limit { Some(offset + limit) } else { None };
        let page = matching.into_iter().take(limit).cloned().collect();
        Ok((page, next_offset))
    }

    async fn delete(&self, id: &str) -> PaiResult<bool> {
        let mut records = self.records.write().map_err(|_| vector_store_err("poisoned lock"))?;
        let existed = records.remove(id).is_some();
        if existed {
            self.order.write().map_err(|_| vector_store_err("poisoned lock"))?.retain(|k| k != id);
        }
        Ok(existed)
    }

    async fn delete_batch(&self, ids: &[String]) -> PaiResult<usize> {
        let mut count = 0;
        for id in ids {
            if self.delete(id).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn update(
        &self,
        id: &str,
        text: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> PaiResult<()> {
        let existing_text = {
            let records = self.records.read().map_err(|_| vector_store_err("poisoned lock"))?;
            records.get(id).map(|s| s.record.text.clone())
        };
        let Some(existing_text) = existing_text else {
            return Err(vector_store_err(format!("no such document: {id}")));
        };

        let new_text = text.unwrap_or(&existing_text).to_string();
        let re_embed = text.is_some();
        let embedding = if re_embed { self.embedder.embed(&new_text).await? } else {
            self.records.read().map_err(|_| vector_store_err("poisoned lock"))?.get(id).unwrap().embedding.clone()
        };

        let mut records = self.records.write().map_err(|_| vector_store_err("poisoned lock"))?;
        let stored = records.get_mut(id).ok_or_else(|| vector_store_err(format!("no such document: {id}")))?;
        stored.record.text = new_text;
        if let Some(metadata) = metadata {
            stored.record.metadata = metadata;
        }
        stored.embedding = embedding;
        Ok(())
    }
}
