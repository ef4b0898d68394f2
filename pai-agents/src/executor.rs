//! Parallel Tool Executor (spec.md §2 row K, §4.2): partitions a batch of
//! tool calls into a side-effect-free parallel group and a side-effecting
//! sequential group, running the parallel group to completion before the
//! sequential one.

use crate::elevation::ElevationManager;
use crate::registry::ToolRegistry;
use crate::security::SecurityValidator;
use pai_core::{ContentBlock, PermissionContext, TaskId, Timestamp, ToolCallId};
use serde_json::Value;
use tokio::sync::Mutex;

/// One requested tool invocation, as parsed out of an assistant's
/// `tool_use` content blocks.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub name: String,
    pub args: Value,
}

/// Outcome of one tool call after security validation and dispatch.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    pub id: ToolCallId,
    pub name: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolCallOutcome {
    pub fn into_content_block(self) -> ContentBlock {
        ContentBlock::tool_result(self.id, self.content, self.is_error)
    }
}

/// Runs one call end to end: security validation, a permission check
/// (attempting elevation on a level gap, SPEC_FULL.md §4.13) taken under
/// the shared permission lock only long enough to decide, then the
/// registry dispatch outside the lock so a slow tool body never blocks
/// sibling calls in the parallel group. Failure at any stage is isolated
/// into an error `ToolCallOutcome` rather than aborting the batch (spec.md
/// §4.2 "per-call failure isolation").
async fn run_one(
    call: &ToolCall,
    registry: &ToolRegistry,
    validator: &SecurityValidator,
    permission: &Mutex<PermissionContext>,
    elevation: Option<&ElevationManager>,
    task_id: TaskId,
    now: Timestamp,
) -> ToolCallOutcome {
    let Some(tool) = registry.get(&call.name) else {
        return ToolCallOutcome {
            id: call.id,
            name: call.name.clone(),
            content: format!("Unknown tool: {}", call.name),
            is_error: true,
        };
    };

    let verdict = validator.validate(tool, &call.args);
    if verdict.is_blocked() {
        let reason = match verdict {
            crate::security::SecurityVerdict::Blocked { reason } => reason,
            crate::security::SecurityVerdict::Allowed => unreachable!(),
        };
        return ToolCallOutcome { id: call.id, name: call.name.clone(), content: reason, is_error: true };
    }

    let permission_check = {
        let mut context = permission.lock().await;
        registry.check_permission(&call.name, &mut context, elevation, task_id, now).await
    };
    if let Err(err) = permission_check {
        return ToolCallOutcome { id: call.id, name: call.name.clone(), content: err.to_string(), is_error: true };
    }

    match registry.dispatch(&call.name, call.args.clone()).await {
        Ok(result) => ToolCallOutcome {
            id: call.id,
            name: call.name.clone(),
            content: result.as_content_string(),
            is_error: !result.success,
        },
        Err(err) => ToolCallOutcome { id: call.id, name: call.name.clone(), content: err.to_string(), is_error: true },
    }
}

/// spec.md §4.2: partitions `calls` into a parallel group (tools with
/// `side_effects == false`) and a sequential group (`side_effects == true`,
/// or unknown tools - treated conservatively as side-effecting), runs the
/// parallel group fully concurrently, then the sequential group strictly in
/// input order. Results preserve the original input order.
pub async fn execute_batch(
    calls: Vec<ToolCall>,
    registry: &ToolRegistry,
    validator: &SecurityValidator,
    permission: &Mutex<PermissionContext>,
    elevation: Option<&ElevationManager>,
    task_id: TaskId,
    now: Timestamp,
) -> Vec<ToolCallOutcome> {
    let mut slots: Vec<Option<ToolCallOutcome>> = vec![None; calls.len()];
    let mut parallel_indices = Vec::new();
    let mut sequential_indices = Vec::new();

    for (index, call) in calls.iter().enumerate() {
        let side_effects = registry.get(&call.name).map(|t| t.side_effects).unwrap_or(true);
        if side_effects {
            sequential_indices.push(index);
        } else {
            parallel_indices.push(index);
        }
    }

    let parallel_futures = parallel_indices
        .iter()
        .map(|&index| run_one(&calls[index], registry, validator, permission, elevation, task_id, now));
    let parallel_results = futures_util::future::join_all(parallel_futures).await;
    for (index, outcome) in parallel_indices.into_iter().zip(parallel_results) {
        slots[index] = Some(outcome);
    }

    for index in sequential_indices {
        let outcome = run_one(&calls[index], registry, validator, permission, elevation, task_id, now).await;
        slots[index] = Some(outcome);
    }

    slots.into_iter().map(|slot| slot.expect("every index filled by one of the two groups")).collect()
}
