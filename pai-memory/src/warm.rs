//! Tier-1 Warm Memory (spec.md §4.7): the vector-backed learning store, with
//! a quality gate, content-based deduplication, ACL- and scope-filtered
//! search, and utility feedback.

use crate::acl::{can_access, Requester};
use pai_core::{
    DomainId, Learning, LearningId, MemoryConfig, MemoryError, MemoryScope, PaiError, PaiResult, Phase,
    ProjectId, Timestamp,
};
use pai_storage::VectorStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

fn memory_err(reason: impl Into<String>) -> PaiError {
    PaiError::Memory(MemoryError::VectorStore { reason: reason.into() })
}

/// Whether `store_learning` created a new record or resolved to an existing
/// near-duplicate (spec.md §4.7 "count a deduplicate/skipped metric").
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    Created(LearningId),
    Deduplicated(LearningId),
}

/// Optional patch fields for `update_learning`; `content` triggers a
/// re-embed, everything else is metadata-only (spec.md §4.7).
#[derive(Debug, Clone, Default)]
pub struct LearningPatch {
    pub content: Option<String>,
    pub confidence: Option<f32>,
    pub tags: Option<Vec<String>>,
    pub utility_score: Option<f32>,
    pub sensitivity: Option<pai_core::Sensitivity>,
    pub allowed_agents: Option<Vec<String>>,
}

/// Parameters accepted by `search_learnings` (spec.md §4.7).
pub struct SearchLearnings<'a> {
    pub query: &'a str,
    pub phase: Option<Phase>,
    pub category: Option<&'a str>,
    pub limit: usize,
    pub agent_type: &'a str,
    pub permission_level: u8,
    pub project_id: Option<ProjectId>,
    pub domain_id: Option<DomainId>,
}

pub struct WarmMemory {
    store: Arc<dyn VectorStore>,
    config: MemoryConfig,
}

impl WarmMemory {
    pub fn new(store: Arc<dyn VectorStore>, config: MemoryConfig) -> Self {
        Self { store, config }
    }

    fn learning_metadata(learning: &Learning) -> PaiResult<Value> {
        serde_json::to_value(learning).map_err(|e| memory_err(e.to_string()))
    }

    fn learning_from_metadata(metadata: &Value) -> PaiResult<Learning> {
        serde_json::from_value(metadata.clone()).map_err(|e| memory_err(e.to_string()))
    }

    pub async fn get_learning(&self, id: &str) -> PaiResult<Option<Learning>> {
        let Some(record) = self.store.get(id).await.map_err(|_| memory_err("lookup failed"))? else {
            return Ok(None);
        };
        Self::learning_from_metadata(&record.metadata).map(Some)
    }

    /// spec.md §4.7 `store_learning`: quality gate, then optional
    /// content-based dedup, then embed-and-insert.
    pub async fn store_learning(&self, learning: Learning, deduplicate: bool) -> PaiResult<StoreOutcome> {
        if !learning.passes_quality_gate(
            self.config.min_content_length,
            self.config.min_confidence,
            self.config.min_alpha_ratio,
        ) {
            return Err(PaiError::Memory(MemoryError::QualityGateRejected {
                reason: "content too short, confidence too low, or too few alphabetic characters".to_string(),
            }));
        }

        if deduplicate {
            let filter = learning.agent_type.as_ref().map(|a| json!({ "agent_type": a }));
            let hits = self
                .store
                .search(&learning.content, self.config.dedup_search_limit, 0.0, filter.as_ref())
                .await
                .map_err(|_| memory_err("dedup search failed"))?;

            for hit in hits {
                if hit.score < self.config.dedup_score_threshold {
                    continue;
                }
                let candidate = Self::learning_from_metadata(&hit.metadata)?;
                if candidate.agent_type == learning.agent_type && candidate.category == learning.category {
                    debug!(existing_id = %candidate.id, "deduplicate/skipped");
                    return Ok(StoreOutcome::Deduplicated(candidate.id));
                }
            }
        }

        let metadata = Self::learning_metadata(&learning)?;
        let id = self
            .store
            .upsert(Some(learning.id.to_string()), &learning.content, metadata)
            .await
            .map_err(|_| memory_err("upsert failed"))?;
        Ok(StoreOutcome::Created(id.parse().unwrap_or(learning.id)))
    }

    /// spec.md §4.7 `update_learning`: patch metadata, re-embed only if
    /// `content` changed, stamp `updated_at`.
    pub async fn update_learning(&self, id: &str, patch: LearningPatch, now: Timestamp) -> PaiResult<()> {
        let mut learning = self
            .get_learning(id)
            .await?
            .ok_or_else(|| PaiError::Memory(MemoryError::NotFound { id: id.to_string() }))?;

        let content_changed = patch.content.is_some();
        if let Some(content) = patch.content {
            learning.content = content;
        }
        if let Some(confidence) = patch.confidence {
            learning.confidence = confidence;
        }
        if let Some(tags) = patch.tags {
            learning.tags = tags;
        }
        if let Some(utility_score) = patch.utility_score {
            learning.utility_score = utility_score;
        }
        if let Some(sensitivity) = patch.sensitivity {
            learning.sensitivity = sensitivity;
        }
        if let Some(allowed_agents) = patch.allowed_agents {
            learning.allowed_agents = Some(allowed_agents);
        }
        learning.metadata.insert("updated_at".to_string(), json!(now.to_rfc3339()));

        let metadata = Self::learning_metadata(&learning)?;
        let new_text = content_changed.then(|| learning.content.clone());
        self.store
            .update(id, new_text.as_deref(), Some(metadata))
            .await
            .map_err(|_| memory_err("update failed"))
    }

    /// spec.md §4.7 `search_learnings`: over-fetch 3x, then ACL- and
    /// scope-filter until `limit` learnings are accepted.
    pub async fn search_learnings(&self, params: SearchLearnings<'_>) -> PaiResult<Vec<Learning>> {
        let mut prefilter = serde_json::Map::new();
        if let Some(phase) = params.phase {
            prefilter.insert("phase".to_string(), json!(phase.as_db_str()));
        }
        if let Some(category) = params.category {
            prefilter.insert("category".to_string(), json!(category));
        }
        let filter = (!prefilter.is_empty()).then(|| Value::Object(prefilter));

        let over_fetch = params.limit.saturating_mul(3).max(params.limit);
        let hits = self
            .store
            .search(params.query, over_fetch, 0.0, filter.as_ref())
            .await
            .map_err(|_| memory_err("search failed"))?;

        let requester = Requester { agent_type: params.agent_type, permission_level: params.permission_level };
        let mut accepted = Vec::with_capacity(params.limit);

        for hit in hits {
            if accepted.len() >= params.limit {
                break;
            }
            let Ok(learning) = Self::learning_from_metadata(&hit.metadata) else { continue };
            if !can_access(&learning, requester) {
                continue;
            }
            if !scope_matches(&learning, params.project_id, params.domain_id) {
                continue;
            }
            accepted.push(learning);
        }

        Ok(accepted)
    }

    /// spec.md §4.9 feedback: `utility = min(1, utility + amount)`,
    /// `access_count += 1`, `last_accessed = now`.
    pub async fn boost_learning(&self, id: &str, amount: f32, now: Timestamp) -> PaiResult<()> {
        let mut learning = self
            .get_learning(id)
            .await?
            .ok_or_else(|| PaiError::Memory(MemoryError::NotFound { id: id.to_string() }))?;
        learning.boost_utility(amount);
        learning.record_access(now);
        let metadata = Self::learning_metadata(&learning)?;
        self.store.update(id, None, Some(metadata)).await.map_err(|_| memory_err("boost failed"))
    }

    /// `utility = max(0, utility - amount)`; no access bookkeeping.
    pub async fn decay_learning(&self, id: &str, amount: f32) -> PaiResult<()> {
        let mut learning = self
            .get_learning(id)
            .await?
            .ok_or_else(|| PaiError::Memory(MemoryError::NotFound { id: id.to_string() }))?;
        learning.decay_utility(amount);
        let metadata = Self::learning_metadata(&learning)?;
        self.store.update(id, None, Some(metadata)).await.map_err(|_| memory_err("decay failed"))
    }

    pub async fn get_learnings_by_category(&self, category: &str, limit: usize) -> PaiResult<Vec<Learning>> {
        let filter = json!({ "category": category });
        self.scroll_all(Some(&filter), limit).await
    }

    pub async fn get_learnings_by_utility(&self, min_utility: f32, limit: usize) -> PaiResult<Vec<Learning>> {
        let mut learnings = self.scroll_all(None, usize::MAX).await?;
        learnings.retain(|l| l.utility_score >= min_utility);
        learnings.sort_by(|a, b| b.utility_score.partial_cmp(&a.utility_score).unwrap_or(std::cmp::Ordering::Equal));
        learnings.truncate(limit);
        Ok(learnings)
    }

    pub async fn get_learnings_before(&self, cutoff: Timestamp, limit: usize) -> PaiResult<Vec<Learning>> {
        let mut learnings = self.scroll_all(None, usize::MAX).await?;
        learnings.retain(|l| l.created_at < cutoff);
        learnings.truncate(limit);
        Ok(learnings)
    }

    /// Page through the vector store's `scroll` until either `limit` records
    /// are collected or the store is exhausted, flattening each hit's
    /// metadata into a `Learning`. Malformed records are skipped.
    async fn scroll_all(&self, filter: Option<&Value>, limit: usize) -> PaiResult<Vec<Learning>> {
        const PAGE_SIZE: usize = 100;
        let mut out = Vec::new();
        let mut offset = None;

        loop {
            let (page, next) = self
                .store
                .scroll(filter, PAGE_SIZE, offset)
                .await
                .map_err(|_| memory_err("scroll failed"))?;

            for record in page {
                if out.len() >= limit {
                    return Ok(out);
                }
                if let Ok(learning) = Self::learning_from_metadata(&record.metadata) {
                    out.push(learning);
                }
            }

            match next {
                Some(n) => offset = Some(n),
                None => break,
            }
        }
        Ok(out)
    }

    pub async fn delete_learning(&self, id: &str) -> PaiResult<bool> {
        self.store.delete(id).await.map_err(|_| memory_err("delete failed"))
    }

    /// Bulk delete, used by `archive_old_warm` once a batch is archived.
    pub async fn delete_learnings(&self, ids: &[String]) -> PaiResult<usize> {
        self.store.delete_batch(ids).await.map_err(|_| memory_err("batch delete failed"))
    }

    /// Every learning currently in the warm tier, up to `limit`. Used by the
    /// cold-archive sweep, which needs to inspect all records regardless of
    /// category.
    pub(crate) async fn get_learnings_all(&self, limit: usize) -> PaiResult<Vec<Learning>> {
        self.scroll_all(None, limit).await
    }
}

/// spec.md §4.7 scope filter: GLOBAL always kept; PROJECT kept only when the
/// caller's project matches; DOMAIN kept only when the caller's domain
/// matches.
fn scope_matches(learning: &Learning, project_id: Option<ProjectId>, domain_id: Option<DomainId>) -> bool {
    match learning.scope {
        MemoryScope::Global => true,
        MemoryScope::Project => learning.project_id.is_some() && learning.project_id == project_id,
        MemoryScope::Domain => learning.domain_id.is_some() && learning.domain_id == domain_id,
    }
}
