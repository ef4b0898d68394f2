//! Running agent state (spec.md §3 "Agent State").

use crate::{
    AgentStatus, ConversationId, ConversationMessage, ProjectId, TaskControlState, TaskId, Timestamp,
    UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A queued user interrupt, appended to history prefixed
/// "[Additional context from user]:" (spec.md §4.4 step b).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub text: String,
    pub received_at: Timestamp,
}

/// Mutable runtime state for one running agent instance (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub status: AgentStatus,
    pub current_task_id: Option<TaskId>,
    pub tasks_completed: u64,
    pub start_time: Timestamp,
    pub history: Vec<ConversationMessage>,
    pub user_id: Option<UserId>,
    pub conversation_id: Option<ConversationId>,
    pub project_id: Option<ProjectId>,
    pub control_state: TaskControlState,
    pub pending_messages: VecDeque<PendingMessage>,
    /// `true` once a `pause()` signal has been issued and not yet resumed.
    pub pause_signalled: bool,
}

impl AgentState {
    pub fn new(start_time: Timestamp) -> Self {
        Self {
            status: AgentStatus::Idle,
            current_task_id: None,
            tasks_completed: 0,
            start_time,
            history: Vec::new(),
            user_id: None,
            conversation_id: None,
            project_id: None,
            control_state: TaskControlState::Completed,
            pending_messages: VecDeque::new(),
            pause_signalled: false,
        }
    }

    /// IDLE -> BUSY transition at the start of `process_task` (spec.md §4.4 step 1).
    pub fn begin_task(&mut self, task_id: TaskId) {
        self.status = AgentStatus::Busy;
        self.current_task_id = Some(task_id);
        self.control_state = TaskControlState::Running;
    }

    /// Always run at the end of `process_task` regardless of outcome (step 9).
    pub fn clear_task(&mut self) {
        self.status = AgentStatus::Idle;
        self.current_task_id = None;
    }

    pub fn pause(&mut self) {
        if self.control_state == TaskControlState::Running {
            self.control_state = TaskControlState::Paused;
            self.pause_signalled = true;
        }
    }

    pub fn resume(&mut self) {
        if self.control_state == TaskControlState::Paused {
            self.control_state = TaskControlState::Running;
            self.pause_signalled = false;
        }
    }

    pub fn cancel(&mut self) {
        self.control_state = TaskControlState::Cancelled;
    }

    pub fn enqueue_interrupt(&mut self, text: impl Into<String>, received_at: Timestamp) {
        self.pending_messages.push_back(PendingMessage {
            text: text.into(),
            received_at,
        });
    }

    /// Drain the pending-message queue into history as user messages
    /// (spec.md §4.4 step b).
    pub fn drain_pending_into_history(&mut self) {
        while let Some(pending) = self.pending_messages.pop_front() {
            self.history.push(ConversationMessage::user(format!(
                "[Additional context from user]: {}",
                pending.text
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityIdType;

    fn now() -> Timestamp {
        Timestamp::from_timestamp(0, 0).unwrap()
    }

    #[test]
    fn begin_task_transitions_idle_to_busy() {
        let mut state = AgentState::new(now());
        let task_id = TaskId::now_v7();
        state.begin_task(task_id);
        assert_eq!(state.status, AgentStatus::Busy);
        assert_eq!(state.current_task_id, Some(task_id));
        assert_eq!(state.control_state, TaskControlState::Running);
    }

    #[test]
    fn pause_then_resume_round_trips() {
        let mut state = AgentState::new(now());
        state.begin_task(TaskId::now_v7());
        state.pause();
        assert_eq!(state.control_state, TaskControlState::Paused);
        assert!(state.pause_signalled);
        state.resume();
        assert_eq!(state.control_state, TaskControlState::Running);
        assert!(!state.pause_signalled);
    }

    #[test]
    fn drain_pending_prefixes_history() {
        let mut state = AgentState::new(now());
        state.enqueue_interrupt("stop using curl", now());
        state.drain_pending_into_history();
        assert_eq!(state.history.len(), 1);
        assert!(state.history[0].content[0]
            == crate::ContentBlock::text("[Additional context from user]: stop using curl"));
    }
}
