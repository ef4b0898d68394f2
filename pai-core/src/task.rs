//! Task request/response and trace types (spec.md §3 "Task Request /
//! Response", "Task Trace", §4.4 "process_task").

use crate::{ConversationId, EntityIdType, Phase, ProjectId, TaskId, Timestamp, Usage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A unit of work dispatched to an agent (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub id: TaskId,
    pub task_type: String,
    pub target_agent_type: String,
    pub payload: HashMap<String, Value>,
    pub correlation_id: Option<String>,
    pub iteration_cap: Option<u32>,
    pub conversation_id: Option<ConversationId>,
    pub project_id: Option<ProjectId>,
}

impl TaskRequest {
    pub fn new(task_type: impl Into<String>, target_agent_type: impl Into<String>) -> Self {
        Self {
            id: TaskId::now_v7(),
            task_type: task_type.into(),
            target_agent_type: target_agent_type.into(),
            payload: HashMap::new(),
            correlation_id: None,
            iteration_cap: None,
            conversation_id: None,
            project_id: None,
        }
    }

    pub fn is_chat(&self) -> bool {
        self.task_type == "chat"
    }
}

/// Final status of a completed (or aborted) task (spec.md §4.4 steps 7-9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcome {
    Completed,
    Failed,
    Cancelled,
    /// Returned when `iteration_limit` is exhausted (spec.md §4.4 step h).
    MaxIterations,
}

/// Reply to a `TaskRequest`, carrying accumulated usage regardless of outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: TaskId,
    pub outcome: TaskOutcome,
    pub agent_type: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub iterations: u32,
    pub usage: Usage,
    pub duration_ms: i64,
    pub correlation_id: Option<String>,
}

impl TaskResponse {
    pub fn completed(
        task_id: TaskId,
        agent_type: impl Into<String>,
        result: impl Into<String>,
        iterations: u32,
        usage: Usage,
        duration_ms: i64,
    ) -> Self {
        Self {
            task_id,
            outcome: TaskOutcome::Completed,
            agent_type: agent_type.into(),
            result: Some(result.into()),
            error: None,
            iterations,
            usage,
            duration_ms,
            correlation_id: None,
        }
    }

    pub fn failed(
        task_id: TaskId,
        agent_type: impl Into<String>,
        error: impl Into<String>,
        iterations: u32,
        usage: Usage,
        duration_ms: i64,
    ) -> Self {
        Self {
            task_id,
            outcome: TaskOutcome::Failed,
            agent_type: agent_type.into(),
            result: None,
            error: Some(error.into()),
            iterations,
            usage,
            duration_ms,
            correlation_id: None,
        }
    }

    pub fn cancelled(task_id: TaskId, agent_type: impl Into<String>, iterations: u32, usage: Usage) -> Self {
        Self {
            task_id,
            outcome: TaskOutcome::Cancelled,
            agent_type: agent_type.into(),
            result: None,
            error: None,
            iterations,
            usage,
            duration_ms: 0,
            correlation_id: None,
        }
    }
}

/// A recorded phase observation for a task, kept in the hot tier with a TTL
/// (spec.md §3 "Task Trace").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTrace {
    pub task_id: TaskId,
    pub phase: Phase,
    pub timestamp: Timestamp,
    pub payload: Value,
}

impl TaskTrace {
    pub fn new(task_id: TaskId, phase: Phase, timestamp: Timestamp, payload: Value) -> Self {
        Self {
            task_id,
            phase,
            timestamp,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_request_defaults_to_no_caps() {
        let req = TaskRequest::new("chat", "infra");
        assert!(req.is_chat());
        assert!(req.iteration_cap.is_none());
    }

    #[test]
    fn completed_response_carries_usage() {
        let usage = Usage::new(100, 50, 0, 0.01);
        let resp = TaskResponse::completed(TaskId::now_v7(), "infra", "done", 3, usage, 120);
        assert_eq!(resp.outcome, TaskOutcome::Completed);
        assert_eq!(resp.usage.input_tokens, 100);
    }
}
