//! Tier-2 Cold Archive operations (spec.md §4.8): demoting warm-tier
//! learnings to append-only files, and the `flush` checkpoint that ties all
//! three tiers together.

use crate::hot::HotMemory;
use crate::warm::WarmMemory;
use chrono::{DateTime, Utc};
use pai_core::{AgentInstanceId, EntityIdType, Learning, MemoryConfig, MemoryScope, PaiResult, Phase, TaskId};
use pai_storage::ColdArchive;
use serde_json::json;
use tracing::warn;

/// spec.md §4.8 `archive_to_cold`: write `{fields…, summary, archived_at}`.
pub fn archive_to_cold(
    cold: &ColdArchive,
    learning: &Learning,
    summary: Option<&str>,
    now: DateTime<Utc>,
) -> PaiResult<()> {
    let mut payload = serde_json::to_value(learning).map_err(|e| {
        pai_core::PaiError::Memory(pai_core::MemoryError::ColdArchive { reason: e.to_string() })
    })?;
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("summary".to_string(), json!(summary));
        obj.insert("archived_at".to_string(), json!(now.to_rfc3339()));
    }
    cold.archive_at(learning.phase, &learning.category, &payload, now)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveOldWarmResult {
    pub archived: usize,
    pub deleted: usize,
}

/// spec.md §4.8 `archive_old_warm`: scroll every warm-tier learning, decide
/// archival eligibility by category + confidence, archive qualifying
/// documents to disk, and delete them from the warm tier once a batch fills.
pub async fn archive_old_warm(
    warm: &WarmMemory,
    cold: &ColdArchive,
    config: &MemoryConfig,
    delete_after_archive: bool,
    now: DateTime<Utc>,
) -> PaiResult<ArchiveOldWarmResult> {
    let learnings = warm.get_learnings_all(usize::MAX).await?;
    let mut result = ArchiveOldWarmResult::default();
    let mut pending_ids: Vec<String> = Vec::new();

    for learning in learnings {
        let age_days = (now - learning.created_at).num_days();
        let cutoff_days = if learning.category == "error" {
            config.archive_older_than_days
        } else if learning.confidence >= config.archive_high_confidence_threshold {
            config.archive_high_confidence_days
        } else {
            config.archive_older_than_days
        };

        if age_days < cutoff_days {
            continue;
        }

        if let Err(err) = archive_to_cold(cold, &learning, None, now) {
            warn!(learning_id = %learning.id, error = %err, "failed to archive learning, skipping");
            continue;
        }
        result.archived += 1;
        pending_ids.push(learning.id.to_string());

        if delete_after_archive && pending_ids.len() >= config.archive_batch_size {
            result.deleted += warm.delete_learnings(&pending_ids).await?;
            pending_ids.clear();
        }
    }

    if delete_after_archive && !pending_ids.is_empty() {
        result.deleted += warm.delete_learnings(&pending_ids).await?;
    }

    Ok(result)
}

/// spec.md §4.8 `cleanup_cold_storage`: filename-timestamp based deletion.
pub fn cleanup_cold_storage(cold: &ColdArchive, older_than_days: i64, now: DateTime<Utc>) -> PaiResult<usize> {
    cold.cleanup_older_than(older_than_days, now)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlushResult {
    pub promoted: usize,
    pub archived: usize,
    pub deleted: usize,
}

/// spec.md §4.8 `flush`: if a VERIFY trace exists for `task_id`, promote it
/// to warm memory; then run `archive_old_warm`; then best-effort trigger the
/// key-value store's `bgsave`.
pub async fn flush(
    task_id: Option<TaskId>,
    hot: &HotMemory,
    warm: &WarmMemory,
    cold: &ColdArchive,
    kv: &std::sync::Arc<dyn pai_storage::KeyValueStore>,
    config: &MemoryConfig,
    now: DateTime<Utc>,
) -> PaiResult<FlushResult> {
    let mut result = FlushResult::default();

    if let Some(task_id) = task_id {
        if let Some(trace) = hot.get_task_trace(task_id, Phase::Verify).await? {
            let content = trace
                .get("summary")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| trace.to_string());

            let mut learning = Learning::new(
                content,
                Phase::Verify,
                "verify_trace",
                AgentInstanceId::now_v7(),
                MemoryScope::Global,
                now,
            );
            learning.task_id = Some(task_id);
            learning.confidence = 0.6;

            match warm.store_learning(learning, false).await {
                Ok(_) => result.promoted = 1,
                Err(_) => {
                    // Trace too short or otherwise ungradeable; flush stays best-effort.
                }
            }
        }
    }

    let archive_result = archive_old_warm(warm, cold, config, true, now).await?;
    result.archived = archive_result.archived;
    result.deleted = archive_result.deleted;

    if let Err(err) = kv.bgsave().await {
        warn!(error = %err, "bgsave failed during flush");
    }

    Ok(result)
}
