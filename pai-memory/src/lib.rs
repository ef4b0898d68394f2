//! PAI Memory: the three-tier memory orchestrator (spec.md §4.6-§4.11, plus
//! SPEC_FULL.md §4.15).
//!
//! Tier-0 Hot Memory is a TTL'd key-value cache of per-task phase traces.
//! Tier-1 Warm Memory is a vector-backed store of `Learning` records with a
//! quality gate, content-based dedup, and ACL/scope-filtered search. Tier-2
//! Cold Archive demotes aged warm-tier learnings to append-only files on
//! disk. The Phase Memory Manager assembles cached, per-phase context out of
//! Warm Memory and the Skill Library; the Skill Library stores reusable
//! execution procedures synthesized from successful task runs. Goal Memory
//! tracks goals, strategies, challenges, and ideas alongside the three
//! tiers, syncing against Warm Memory's utility ranking rather than
//! duplicating it.

mod acl;
mod cold;
mod goals;
mod hot;
mod phase;
mod skill_library;
mod warm;

pub use acl::{can_access, Requester};
pub use cold::{archive_old_warm, archive_to_cold, cleanup_cold_storage, flush, ArchiveOldWarmResult, FlushResult};
pub use goals::{Challenge, ChallengeStatus, Goal, GoalMemory, GoalPriority, GoalStatus, Idea, IdeaSource, Strategy};
pub use hot::HotMemory;
pub use phase::{PhaseContext, PhaseContextParams, PhaseMemoryManager};
pub use skill_library::{
    instantiate_skill, ExecutionOutcome, ExecutionPlan, InstantiatedPlan, InstantiatedStep, SkillLibrary,
};
pub use warm::{LearningPatch, SearchLearnings, StoreOutcome, WarmMemory};

use pai_core::{Learning, MemoryConfig, PaiResult, Phase, TaskId};
use pai_storage::{ColdArchive, KeyValueStore, VectorStore};
use serde_json::Value;
use std::sync::Arc;

/// Owns all three tiers plus the Phase Memory Manager and Skill Library, and
/// exposes them as one facade (spec.md §4.6 "Memory System").
pub struct MemorySystem {
    pub hot: HotMemory,
    pub warm: Arc<WarmMemory>,
    pub cold: ColdArchive,
    pub skills: Arc<SkillLibrary>,
    pub phase: PhaseMemoryManager,
    pub goals: GoalMemory,
    kv: Arc<dyn KeyValueStore>,
    config: MemoryConfig,
}

impl MemorySystem {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        learning_store: Arc<dyn VectorStore>,
        skill_store: Arc<dyn VectorStore>,
        cold_root: impl Into<std::path::PathBuf>,
        config: MemoryConfig,
    ) -> Self {
        let hot = HotMemory::new(kv.clone(), config.hot_tier_ttl_secs);
        let warm = Arc::new(WarmMemory::new(learning_store, config.clone()));
        let cold = ColdArchive::new(cold_root);
        let skills = Arc::new(SkillLibrary::new(skill_store));
        let phase = PhaseMemoryManager::new(warm.clone(), skills.clone(), kv.clone(), config.clone());
        let goals = GoalMemory::new(kv.clone());

        Self { hot, warm, cold, skills, phase, goals, kv, config }
    }

    /// SPEC_FULL.md §4.15 "sync with PAI Memory by utility score": the top
    /// warm-tier learnings above `min_utility`, for a caller (e.g. the goal
    /// system's context injection) to fold into a goal or project summary.
    /// This is read-only with respect to `goals` — it does not duplicate
    /// learnings into goal storage, only exposes the same ranking TELOS used.
    pub async fn sync_top_learnings(&self, min_utility: f32, limit: usize) -> PaiResult<Vec<Learning>> {
        self.warm.get_learnings_by_utility(min_utility, limit).await
    }

    pub async fn store_task_trace(&self, task_id: TaskId, phase: Phase, data: &Value) -> PaiResult<()> {
        self.hot.store_task_trace(task_id, phase, data).await
    }

    pub async fn get_task_trace(&self, task_id: TaskId, phase: Phase) -> PaiResult<Option<Value>> {
        self.hot.get_task_trace(task_id, phase).await
    }

    pub async fn store_learning(&self, learning: Learning, deduplicate: bool) -> PaiResult<StoreOutcome> {
        self.warm.store_learning(learning, deduplicate).await
    }

    pub async fn search_learnings(&self, params: SearchLearnings<'_>) -> PaiResult<Vec<Learning>> {
        self.warm.search_learnings(params).await
    }

    /// spec.md §4.8 `flush`: promote the task's VERIFY trace (if any), sweep
    /// aged warm-tier learnings to cold storage, and trigger `bgsave`.
    pub async fn flush(&self, task_id: Option<TaskId>, now: chrono::DateTime<chrono::Utc>) -> PaiResult<FlushResult> {
        cold::flush(task_id, &self.hot, &self.warm, &self.cold, &self.kv, &self.config, now).await
    }

    pub async fn cleanup_cold_storage(&self, older_than_days: i64, now: chrono::DateTime<chrono::Utc>) -> PaiResult<usize> {
        cold::cleanup_cold_storage(&self.cold, older_than_days, now)
    }
}
