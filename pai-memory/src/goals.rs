//! Goal and strategy memory (SPEC_FULL.md §4.15 "TELOS goal tracking"):
//! hierarchical goals with progress, strategies extracted from successful
//! multi-step traces, recurring challenges, and ideas captured from user
//! messages. Synced against warm memory's top-utility learnings rather than
//! duplicating them.

use once_cell::sync::Lazy;
use pai_core::{EntityIdType, GoalId, MemoryError, PaiError, PaiResult, ProjectId, Timestamp};
use pai_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn memory_err(reason: impl Into<String>) -> PaiError {
    PaiError::Memory(MemoryError::KeyValueStore { reason: reason.into() })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A tracked goal (SPEC_FULL.md §4.15): `progress` drives `status` rather than
/// the other way around, so callers only ever report progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub name: String,
    pub description: String,
    pub status: GoalStatus,
    pub priority: GoalPriority,
    pub progress: f32,
    pub project_id: Option<ProjectId>,
    pub related_tasks: Vec<String>,
    pub created_at: Timestamp,
    pub target_date: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Goal {
    pub fn new(name: impl Into<String>, description: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: GoalId::now_v7(),
            name: name.into(),
            description: description.into(),
            status: GoalStatus::default(),
            priority: GoalPriority::default(),
            progress: 0.0,
            project_id: None,
            related_tasks: Vec::new(),
            created_at: now,
            target_date: None,
            completed_at: None,
        }
    }

    /// Clamps to `[0, 100]`; crossing 100 completes the goal, crossing above
    /// 0 without completing moves it from `Pending` into `InProgress`.
    fn apply_progress(&mut self, progress: f32, now: Timestamp) {
        self.progress = progress.clamp(0.0, 100.0);
        if self.progress >= 100.0 {
            self.status = GoalStatus::Completed;
            self.completed_at = Some(now);
        } else if self.progress > 0.0 {
            self.status = GoalStatus::InProgress;
        }
    }
}

/// A pattern extracted from a successful multi-step task trace (SPEC_FULL.md
/// §4.15 "strategy extraction"), e.g. a sequence of tool names or phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: GoalId,
    pub name: String,
    pub description: String,
    pub pattern: Vec<String>,
    pub success_rate: f32,
    pub use_count: u32,
    pub project_id: Option<ProjectId>,
    pub created_at: Timestamp,
}

/// A recurring blocker (SPEC_FULL.md §4.15): re-reporting the same description
/// bumps `occurrences` instead of creating a duplicate record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: GoalId,
    pub description: String,
    pub status: ChallengeStatus,
    pub error_pattern: Option<String>,
    pub resolution: Option<String>,
    pub occurrences: u32,
    pub project_id: Option<ProjectId>,
    pub created_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Active,
    Resolved,
    Deferred,
}

/// A captured idea (SPEC_FULL.md §4.15 "idea capture"), from a user message or
/// recorded manually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    pub id: GoalId,
    pub content: String,
    pub source: IdeaSource,
    pub project_id: Option<ProjectId>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaSource {
    UserMessage,
    TaskResult,
    Manual,
}

/// Idea-detection patterns (SPEC_FULL.md §4.15, grounded on the TELOS
/// `IDEA_PATTERNS` list): a user message matching one of these is captured
/// as an idea rather than requiring an explicit `capture_idea` call.
static IDEA_PATTERNS: Lazy<Vec<regex::Regex>> = Lazy::new(|| {
    [
        r"(?i)I should\s+(.+)",
        r"(?i)what if\s+(.+)",
        r"(?i)maybe we could\s+(.+)",
        r"(?i)it would be cool to\s+(.+)",
        r"(?i)TODO:\s*(.+)",
        r"(?i)idea:\s*(.+)",
        r"(?i)we should\s+(.+)",
        r"(?i)let's\s+(.+)",
    ]
    .iter()
    .map(|p| regex::Regex::new(p).expect("idea pattern is a fixed, valid regex"))
    .collect()
});

fn scope_key(prefix: &str, project_id: Option<ProjectId>) -> String {
    match project_id {
        Some(id) => format!("pai:{prefix}:project:{id}"),
        None => format!("pai:{prefix}:global"),
    }
}

fn record_key(prefix: &str, id: GoalId) -> String {
    format!("pai:{prefix}:{id}")
}

/// Goal/strategy/challenge/idea tracking (SPEC_FULL.md §4.15), backed directly by
/// the key-value store in the same way as `HotMemory`: each record lives at
/// its own key, with a per-scope index set for listing.
pub struct GoalMemory {
    kv: Arc<dyn KeyValueStore>,
}

impl GoalMemory {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    async fn put<T: Serialize>(&self, prefix: &str, id: GoalId, project_id: Option<ProjectId>, record: &T) -> PaiResult<()> {
        let serialized = serde_json::to_string(record).map_err(|e| memory_err(e.to_string()))?;
        self.kv.set(&record_key(prefix, id), &serialized, None).await?;
        self.kv.sadd(&scope_key(prefix, project_id), &id.to_string()).await?;
        Ok(())
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, prefix: &str, id: GoalId) -> PaiResult<Option<T>> {
        let Some(raw) = self.kv.get(&record_key(prefix, id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| memory_err(e.to_string()))
    }

    async fn list<T: for<'de> Deserialize<'de>>(&self, prefix: &str, project_id: Option<ProjectId>) -> PaiResult<Vec<T>> {
        let ids = self.kv.smembers(&scope_key(prefix, project_id)).await?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let key = format!("pai:{prefix}:{id}");
            if let Some(raw) = self.kv.get(&key).await? {
                if let Ok(record) = serde_json::from_str(&raw) {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    pub async fn add_goal(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        project_id: Option<ProjectId>,
        priority: GoalPriority,
        now: Timestamp,
    ) -> PaiResult<Goal> {
        let mut goal = Goal::new(name, description, now);
        goal.project_id = project_id;
        goal.priority = priority;
        self.put("goal", goal.id, project_id, &goal).await?;
        Ok(goal)
    }

    pub async fn get_goal(&self, id: GoalId) -> PaiResult<Option<Goal>> {
        self.get("goal", id).await
    }

    pub async fn list_goals(&self, project_id: Option<ProjectId>) -> PaiResult<Vec<Goal>> {
        self.list("goal", project_id).await
    }

    /// SPEC_FULL.md §4.15 `update_goal_progress`: fetch, clamp-and-derive status,
    /// re-store. Returns `NotFound` rather than silently no-op'ing.
    pub async fn update_goal_progress(&self, id: GoalId, progress: f32, now: Timestamp) -> PaiResult<Goal> {
        let mut goal: Goal =
            self.get("goal", id).await?.ok_or_else(|| PaiError::Memory(MemoryError::NotFound { id: id.to_string() }))?;
        goal.apply_progress(progress, now);
        self.put("goal", goal.id, goal.project_id, &goal).await?;
        Ok(goal)
    }

    /// SPEC_FULL.md §4.15 `extract_strategy`: requires at least 3 trace steps,
    /// mirroring the TELOS rule that a "strategy" is a pattern, not a
    /// single action. Truncates to the first 10 steps.
    pub async fn extract_strategy(
        &self,
        steps: &[String],
        project_id: Option<ProjectId>,
        now: Timestamp,
    ) -> PaiResult<Option<Strategy>> {
        if steps.len() < 3 {
            return Ok(None);
        }
        let pattern: Vec<String> = steps.iter().take(10).cloned().collect();
        let strategy = Strategy {
            id: GoalId::now_v7(),
            name: format!("multi-step pattern ({} steps)", pattern.len()),
            description: "automatically extracted from a successful task trace".to_string(),
            pattern,
            success_rate: 1.0,
            use_count: 1,
            project_id,
            created_at: now,
        };
        self.put("strategy", strategy.id, project_id, &strategy).await?;
        Ok(Some(strategy))
    }

    pub async fn list_strategies(&self, project_id: Option<ProjectId>) -> PaiResult<Vec<Strategy>> {
        self.list("strategy", project_id).await
    }

    /// SPEC_FULL.md §4.15 `update_challenges`: a new report whose description is
    /// a substring match (either direction) of an existing active challenge
    /// bumps `occurrences` instead of creating a duplicate.
    pub async fn report_challenge(
        &self,
        description: impl Into<String>,
        error_pattern: Option<String>,
        project_id: Option<ProjectId>,
        now: Timestamp,
    ) -> PaiResult<Challenge> {
        let description = description.into();
        let lower = description.to_lowercase();
        let mut challenges: Vec<Challenge> = self.list("challenge", project_id).await?;

        if let Some(existing) = challenges
            .iter_mut()
            .find(|c| c.status == ChallengeStatus::Active && (c.description.to_lowercase().contains(&lower) || lower.contains(&c.description.to_lowercase())))
        {
            existing.occurrences += 1;
            let updated = existing.clone();
            self.put("challenge", updated.id, project_id, &updated).await?;
            return Ok(updated);
        }

        let challenge = Challenge {
            id: GoalId::now_v7(),
            description,
            status: ChallengeStatus::Active,
            error_pattern,
            resolution: None,
            occurrences: 1,
            project_id,
            created_at: now,
            resolved_at: None,
        };
        self.put("challenge", challenge.id, project_id, &challenge).await?;
        Ok(challenge)
    }

    pub async fn resolve_challenge(&self, id: GoalId, resolution: impl Into<String>, now: Timestamp) -> PaiResult<Challenge> {
        let mut challenge: Challenge =
            self.get("challenge", id).await?.ok_or_else(|| PaiError::Memory(MemoryError::NotFound { id: id.to_string() }))?;
        challenge.status = ChallengeStatus::Resolved;
        challenge.resolution = Some(resolution.into());
        challenge.resolved_at = Some(now);
        self.put("challenge", challenge.id, challenge.project_id, &challenge).await?;
        Ok(challenge)
    }

    pub async fn list_challenges(&self, project_id: Option<ProjectId>) -> PaiResult<Vec<Challenge>> {
        self.list("challenge", project_id).await
    }

    pub async fn capture_idea(
        &self,
        content: impl Into<String>,
        source: IdeaSource,
        project_id: Option<ProjectId>,
        now: Timestamp,
    ) -> PaiResult<Idea> {
        let idea = Idea { id: GoalId::now_v7(), content: content.into(), source, project_id, created_at: now };
        self.put("idea", idea.id, project_id, &idea).await?;
        Ok(idea)
    }

    /// SPEC_FULL.md §4.15 `detect_ideas_in_message`: scans `message` against the
    /// fixed idea patterns, capturing one idea per match.
    pub async fn detect_ideas(&self, message: &str, project_id: Option<ProjectId>, now: Timestamp) -> PaiResult<Vec<Idea>> {
        let mut captured = Vec::new();
        for pattern in IDEA_PATTERNS.iter() {
            for capture in pattern.captures_iter(message) {
                let Some(text) = capture.get(1) else { continue };
                let idea = self.capture_idea(text.as_str().trim(), IdeaSource::UserMessage, project_id, now).await?;
                captured.push(idea);
            }
        }
        Ok(captured)
    }

    pub async fn list_ideas(&self, project_id: Option<ProjectId>) -> PaiResult<Vec<Idea>> {
        self.list("idea", project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pai_storage::MemoryKeyValueStore;

    fn goals() -> GoalMemory {
        GoalMemory::new(Arc::new(MemoryKeyValueStore::new()))
    }

    fn now() -> Timestamp {
        Timestamp::from_timestamp(0, 0).unwrap()
    }

    #[tokio::test]
    async fn add_then_list_goal_round_trips() {
        let goals = goals();
        let goal = goals.add_goal("ship v1", "first release", None, GoalPriority::High, now()).await.unwrap();
        let listed = goals.list_goals(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, goal.id);
        assert_eq!(listed[0].status, GoalStatus::Pending);
    }

    #[tokio::test]
    async fn progress_past_zero_moves_to_in_progress_then_completes_at_100() {
        let goals = goals();
        let goal = goals.add_goal("ship v1", "first release", None, GoalPriority::Medium, now()).await.unwrap();

        let updated = goals.update_goal_progress(goal.id, 40.0, now()).await.unwrap();
        assert_eq!(updated.status, GoalStatus::InProgress);
        assert!(updated.completed_at.is_none());

        let completed = goals.update_goal_progress(goal.id, 140.0, now()).await.unwrap();
        assert_eq!(completed.status, GoalStatus::Completed);
        assert_eq!(completed.progress, 100.0);
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn update_progress_on_missing_goal_is_not_found() {
        let goals = goals();
        let result = goals.update_goal_progress(GoalId::now_v7(), 50.0, now()).await;
        assert!(matches!(result, Err(PaiError::Memory(MemoryError::NotFound { .. }))));
    }

    #[tokio::test]
    async fn extract_strategy_requires_at_least_three_steps() {
        let goals = goals();
        let steps = vec!["read_file".to_string(), "edit_file".to_string()];
        assert!(goals.extract_strategy(&steps, None, now()).await.unwrap().is_none());

        let steps =
            vec!["read_file".to_string(), "edit_file".to_string(), "run_tests".to_string()];
        let strategy = goals.extract_strategy(&steps, None, now()).await.unwrap().unwrap();
        assert_eq!(strategy.pattern, steps);
        assert_eq!(strategy.use_count, 1);
    }

    #[tokio::test]
    async fn reporting_the_same_challenge_twice_increments_occurrences() {
        let goals = goals();
        goals.report_challenge("flaky network timeout", None, None, now()).await.unwrap();
        let second = goals.report_challenge("network timeout under load", None, None, now()).await.unwrap();
        assert_eq!(second.occurrences, 2);
        assert_eq!(goals.list_challenges(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_challenge_stamps_resolution() {
        let goals = goals();
        let challenge = goals.report_challenge("db connection pool exhausted", None, None, now()).await.unwrap();
        let resolved = goals.resolve_challenge(challenge.id, "raised pool size to 50", now()).await.unwrap();
        assert_eq!(resolved.status, ChallengeStatus::Resolved);
        assert_eq!(resolved.resolution.as_deref(), Some("raised pool size to 50"));
    }

    #[tokio::test]
    async fn detect_ideas_captures_each_pattern_match() {
        let goals = goals();
        let message = "I should add retry logic. Also, what if we cached the embeddings?";
        let captured = goals.detect_ideas(message, None, now()).await.unwrap();
        assert_eq!(captured.len(), 2);
        assert!(captured.iter().any(|i| i.content.contains("add retry logic")));
        assert!(captured.iter().any(|i| i.content.contains("we cached the embeddings")));
        assert_eq!(goals.list_ideas(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn detect_ideas_is_a_noop_when_nothing_matches() {
        let goals = goals();
        let captured = goals.detect_ideas("the build is green", None, now()).await.unwrap();
        assert!(captured.is_empty());
    }
}
