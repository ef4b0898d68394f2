//! Embedding result cache, keyed by content hash, to avoid redundant
//! provider calls for repeated text (spec.md §4.9 references a warm-tier
//! dedup probe by content hash; the same idea applies to embedding reuse).

use pai_core::{ContentHash, EmbeddingVector};
use std::collections::HashMap;
use std::sync::RwLock;

pub struct EmbeddingCache {
    cache: RwLock<HashMap<ContentHash, EmbeddingVector>>,
    max_size: usize,
}

impl EmbeddingCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            max_size,
        }
    }

    pub fn get(&self, hash: &ContentHash) -> Option<EmbeddingVector> {
        self.cache.read().ok()?.get(hash).cloned()
    }

    pub fn insert(&self, hash: ContentHash, embedding: EmbeddingVector) {
        if let Ok(mut cache) = self.cache.write() {
            if cache.len() < self.max_size {
                cache.insert(hash, embedding);
            }
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("max_size", &self.max_size)
            .field("current_size", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pai_core::compute_content_hash;

    #[test]
    fn insert_then_get_round_trips() {
        let cache = EmbeddingCache::new(10);
        let hash = compute_content_hash(b"hello");
        let embedding = EmbeddingVector::new(vec![1.0, 2.0], "test");
        cache.insert(hash, embedding.clone());
        assert_eq!(cache.get(&hash).unwrap().data, embedding.data);
    }

    #[test]
    fn respects_max_size() {
        let cache = EmbeddingCache::new(1);
        cache.insert(compute_content_hash(b"a"), EmbeddingVector::new(vec![1.0], "t"));
        cache.insert(compute_content_hash(b"b"), EmbeddingVector::new(vec![2.0], "t"));
        assert_eq!(cache.len(), 1);
    }
}
