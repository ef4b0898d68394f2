//! Phase Memory Manager (spec.md §4.10): cached, per-phase context assembly
//! over Warm Memory and the Skill Library, with utility feedback.

use crate::skill_library::SkillLibrary;
use crate::warm::{SearchLearnings, WarmMemory};
use pai_core::{DomainId, Learning, MemoryConfig, PaiResult, Phase, ProjectId, Skill, TaskId, Timestamp};
use pai_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Categories queried for each phase, each with its own per-category limit
/// (spec.md §4.10: "a static query configuration specifies categories and
/// a per-category limit"). spec.md does not name the categories; these
/// cover the general-purpose ones every learning category table in this
/// crate uses (`insight`, `gotcha`, `convention`, `test_pattern`).
fn phase_categories(phase: Phase) -> &'static [(&'static str, usize)] {
    match phase {
        Phase::Observe => &[("insight", 5)],
        Phase::Think => &[("insight", 5), ("gotcha", 5)],
        Phase::Plan => &[("insight", 5), ("gotcha", 5)],
        Phase::Build => &[("gotcha", 5), ("convention", 5)],
        Phase::Execute => &[("gotcha", 5)],
        Phase::Verify => &[("gotcha", 5), ("test_pattern", 5)],
        Phase::Learn => &[("insight", 5)],
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseContext {
    pub phase: String,
    pub learnings: Vec<Learning>,
    pub patterns: Vec<Learning>,
    pub skills: Vec<Skill>,
    pub metadata: serde_json::Value,
    pub learning_ids: Vec<String>,
}

pub struct PhaseContextParams<'a> {
    pub phase: Phase,
    pub task_id: TaskId,
    pub task_description: &'a str,
    pub agent_type: &'a str,
    pub permission_level: u8,
    pub project_id: Option<ProjectId>,
    pub domain_id: Option<DomainId>,
    pub tool_name: Option<&'a str>,
}

pub struct PhaseMemoryManager {
    warm: Arc<WarmMemory>,
    skills: Arc<SkillLibrary>,
    kv: Arc<dyn KeyValueStore>,
    config: MemoryConfig,
}

impl PhaseMemoryManager {
    pub fn new(warm: Arc<WarmMemory>, skills: Arc<SkillLibrary>, kv: Arc<dyn KeyValueStore>, config: MemoryConfig) -> Self {
        Self { warm, skills, kv, config }
    }

    fn cache_key(task_id: TaskId, phase: Phase, tool_name: Option<&str>) -> String {
        format!("pai:phase_context:{task_id}:{}:{}", phase.as_db_str(), tool_name.unwrap_or("-"))
    }

    fn used_ids_key(task_id: TaskId) -> String {
        format!("pai:phase_context:{task_id}:used_ids")
    }

    /// spec.md §4.10 `get_phase_context`.
    pub async fn get_phase_context(&self, params: PhaseContextParams<'_>) -> PaiResult<PhaseContext> {
        let cache_key = Self::cache_key(params.task_id, params.phase, params.tool_name);

        if let Some(raw) = self.kv.get(&cache_key).await? {
            if let Ok(cached) = serde_json::from_str::<PhaseContext>(&raw) {
                self.track_used_ids(params.task_id, &cached.learning_ids).await?;
                return Ok(cached);
            }
        }

        let limit_cap = phase_categories(params.phase).iter().map(|(_, l)| *l).max().unwrap_or(5);
        let mut queries: Vec<(Option<&'static str>, SearchLearnings<'_>)> = vec![(
            None,
            SearchLearnings {
                query: params.task_description,
                phase: Some(params.phase),
                category: None,
                limit: limit_cap,
                agent_type: params.agent_type,
                permission_level: params.permission_level,
                project_id: params.project_id,
                domain_id: params.domain_id,
            },
        )];

        for (category, limit) in phase_categories(params.phase) {
            queries.push((
                Some(*category),
                SearchLearnings {
                    query: params.task_description,
                    phase: Some(params.phase),
                    category: Some(category),
                    limit: *limit,
                    agent_type: params.agent_type,
                    permission_level: params.permission_level,
                    project_id: params.project_id,
                    domain_id: params.domain_id,
                },
            ));
        }

        if params.phase == Phase::Build {
            if let Some(tool_name) = params.tool_name {
                for category in ["tool_success", "tool_error"] {
                    queries.push((
                        Some(category),
                        SearchLearnings {
                            query: tool_name,
                            phase: Some(params.phase),
                            category: Some(category),
                            limit: 5,
                            agent_type: params.agent_type,
                            permission_level: params.permission_level,
                            project_id: params.project_id,
                            domain_id: params.domain_id,
                        },
                    ));
                }
            }
        }

        // spec.md §5 "exception isolation": a failing query yields empty
        // rather than aborting the whole phase-context assembly.
        let mut seen = HashSet::new();
        let mut learnings = Vec::new();
        let mut patterns = Vec::new();

        for (category, query) in queries {
            match self.warm.search_learnings(query).await {
                Ok(hits) => {
                    for hit in hits {
                        if !seen.insert(hit.id) {
                            continue;
                        }
                        if hit.is_pattern() {
                            patterns.push(hit);
                        } else {
                            learnings.push(hit);
                        }
                    }
                }
                Err(err) => warn!(error = %err, ?category, "phase context query failed, yielding empty"),
            }
        }

        let mut skills = Vec::new();
        if matches!(params.phase, Phase::Think | Phase::Plan) {
            match self.skills.find_applicable_skills(params.task_description, &Default::default(), 0.0, 10).await {
                Ok(found) => skills = found,
                Err(err) => warn!(error = %err, "skill lookup failed for phase context"),
            }
        }

        learnings.sort_by(|a, b| b.utility_score.partial_cmp(&a.utility_score).unwrap_or(std::cmp::Ordering::Equal));
        learnings.truncate(limit_cap * 2);

        let learning_ids: Vec<String> = learnings.iter().chain(patterns.iter()).map(|l| l.id.to_string()).collect();

        let context = PhaseContext {
            phase: params.phase.as_db_str().to_string(),
            learnings,
            patterns,
            skills,
            metadata: json!({ "task_id": params.task_id.to_string() }),
            learning_ids,
        };

        if let Ok(serialized) = serde_json::to_string(&context) {
            self.kv.set(&cache_key, &serialized, Some(self.config.phase_cache_ttl_secs as i64)).await?;
        }
        self.track_used_ids(params.task_id, &context.learning_ids).await?;

        Ok(context)
    }

    async fn track_used_ids(&self, task_id: TaskId, ids: &[String]) -> PaiResult<()> {
        let key = Self::used_ids_key(task_id);
        for id in ids {
            self.kv.sadd(&key, id).await?;
        }
        Ok(())
    }

    /// spec.md §4.10 `apply_feedback`: boost on success, decay on failure,
    /// for every learning id this task's phase contexts have handed out;
    /// clears the tracking set afterward.
    pub async fn apply_feedback(
        &self,
        task_id: TaskId,
        success: bool,
        boost: f32,
        decay: f32,
        now: Timestamp,
    ) -> PaiResult<usize> {
        let used_ids_key = Self::used_ids_key(task_id);
        let ids = self.kv.smembers(&used_ids_key).await?;
        let mut count = 0;

        for id in &ids {
            let outcome =
                if success { self.warm.boost_learning(id, boost, now).await } else { self.warm.decay_learning(id, decay).await };
            if outcome.is_ok() {
                count += 1;
            }
        }

        self.kv.delete(&used_ids_key).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pai_core::{
        compute_content_hash, AgentInstanceId, EmbeddingProvider, EmbeddingVector, EntityIdType, MemoryScope,
    };
    use pai_storage::{MemoryKeyValueStore, MemoryVectorStore};

    struct HashEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for HashEmbedder {
        async fn embed(&self, text: &str) -> PaiResult<EmbeddingVector> {
            let hash = compute_content_hash(text.as_bytes());
            Ok(EmbeddingVector::new(hash.iter().take(4).map(|b| *b as f32).collect(), "hash-embedder"))
        }
        async fn embed_batch(&self, texts: &[&str]) -> PaiResult<Vec<EmbeddingVector>> {
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }
        fn dimensions(&self) -> i32 {
            4
        }
        fn model_id(&self) -> &str {
            "hash-embedder"
        }
    }

    fn manager() -> PhaseMemoryManager {
        let warm = Arc::new(WarmMemory::new(Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder))), MemoryConfig::default()));
        let skills = Arc::new(SkillLibrary::new(Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder)))));
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        PhaseMemoryManager::new(warm, skills, kv, MemoryConfig::default())
    }

    fn sample_learning(content: &str, category: &str) -> Learning {
        let mut l = Learning::new(
            content,
            Phase::Build,
            category,
            AgentInstanceId::now_v7(),
            MemoryScope::Global,
            Timestamp::from_timestamp(0, 0).unwrap(),
        );
        l.confidence = 0.8;
        l
    }

    #[tokio::test]
    async fn get_phase_context_classifies_patterns_vs_learnings() {
        let manager = manager();
        manager.warm.store_learning(sample_learning("Retries should back off exponentially", "gotcha"), false).await.unwrap();
        manager.warm.store_learning(sample_learning("cargo build succeeded cleanly", "tool_success"), false).await.unwrap();

        let context = manager
            .get_phase_context(PhaseContextParams {
                phase: Phase::Build,
                task_id: TaskId::now_v7(),
                task_description: "build the release binary",
                agent_type: "build",
                permission_level: 1,
                project_id: None,
                domain_id: None,
                tool_name: Some("cargo build"),
            })
            .await
            .unwrap();

        assert!(!context.patterns.is_empty());
    }

    #[tokio::test]
    async fn get_phase_context_is_cached_on_second_call() {
        let manager = manager();
        let task_id = TaskId::now_v7();
        let params = || PhaseContextParams {
            phase: Phase::Think,
            task_id,
            task_description: "plan the migration",
            agent_type: "planner",
            permission_level: 1,
            project_id: None,
            domain_id: None,
            tool_name: None,
        };

        let first = manager.get_phase_context(params()).await.unwrap();
        let second = manager.get_phase_context(params()).await.unwrap();
        assert_eq!(first.learning_ids, second.learning_ids);
    }

    #[tokio::test]
    async fn apply_feedback_boosts_used_learnings_and_clears_tracking() {
        let manager = manager();
        let task_id = TaskId::now_v7();
        let learning = sample_learning("Prefer structured logging over println", "insight");
        let id = learning.id;
        manager.warm.store_learning(learning, false).await.unwrap();

        manager
            .get_phase_context(PhaseContextParams {
                phase: Phase::Think,
                task_id,
                task_description: "structured logging over println",
                agent_type: "build",
                permission_level: 1,
                project_id: None,
                domain_id: None,
                tool_name: None,
            })
            .await
            .unwrap();

        let before = manager.warm.get_learning(&id.to_string()).await.unwrap().unwrap();
        let applied = manager.apply_feedback(task_id, true, 0.1, 0.05, Timestamp::from_timestamp(100, 0).unwrap()).await.unwrap();
        assert!(applied >= 1);

        let after = manager.warm.get_learning(&id.to_string()).await.unwrap().unwrap();
        assert!(after.utility_score >= before.utility_score);

        let remaining = manager.kv.smembers(&PhaseMemoryManager::used_ids_key(task_id)).await.unwrap();
        assert!(remaining.is_empty());
    }
}
