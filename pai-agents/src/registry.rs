//! Tool Registry (spec.md §2 row G, §4.1): a named catalog of tools,
//! permission-checked and dispatched via an async executor trait.

use crate::elevation::{ElevationDecision, ElevationManager};
use async_trait::async_trait;
use pai_core::{PaiResult, PermissionContext, TaskId, Timestamp, Tool, ToolError, ToolResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Implemented once per tool, performing the actual side effect.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, args: Value) -> ToolResult;
}

struct RegisteredTool {
    tool: Tool,
    executor: Arc<dyn ToolExecutor>,
}

/// spec.md §4.1: `register`, `list`, `schemas`, `check_permission`, `execute`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Tool, executor: Arc<dyn ToolExecutor>) {
        self.tools.insert(tool.name.clone(), RegisteredTool { tool, executor });
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name).map(|r| &r.tool)
    }

    pub fn list(&self) -> Vec<&Tool> {
        self.tools.values().map(|r| &r.tool).collect()
    }

    /// The JSON schemas shipped to the LLM, filtered to tools reachable at
    /// `context`'s current effective permission level (spec.md §4.4 step e).
    pub fn schemas(&self, context: &PermissionContext, now: Timestamp) -> Vec<pai_core::ToolSchema> {
        let level = context.current_level(now);
        self.tools
            .values()
            .filter(|r| r.tool.required_level <= level)
            .filter(|r| r.tool.capability.map(|c| context.allows_capability(c)).unwrap_or(true))
            .map(|r| r.tool.schema())
            .collect()
    }

    /// spec.md §4.1 `check_permission`, extended by SPEC_FULL.md §4.13: a
    /// capability gap always fails closed, but an insufficient level first
    /// tries the Elevation Manager (auto-approve on a small, non-critical
    /// bump; otherwise the caller gets `ElevationPending` rather than a
    /// silent denial) before failing closed.
    pub async fn check_permission(
        &self,
        name: &str,
        context: &mut PermissionContext,
        elevation: Option<&ElevationManager>,
        task_id: TaskId,
        now: Timestamp,
    ) -> Result<(), ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool { name: name.to_string() })?;

        if let Some(capability) = tool.capability {
            if !context.allows_capability(capability) {
                return Err(ToolError::PermissionDenied {
                    reason: format!("agent type '{}' is not allowed capability {capability}", context.agent_type),
                });
            }
        }

        let level = context.current_level(now);
        if tool.required_level > level {
            let Some(elevation) = elevation else {
                return Err(ToolError::PermissionDenied {
                    reason: format!("tool '{name}' requires level {} but effective level is {level}", tool.required_level),
                });
            };

            let decision = elevation
                .request_elevation(
                    context,
                    tool.required_level,
                    name,
                    task_id,
                    "auto_elevate",
                    format!("tool '{name}' requires level {} but effective level is {level}", tool.required_level),
                    now,
                )
                .await
                .map_err(|e| ToolError::PermissionDenied { reason: e.to_string() })?;

            match decision {
                ElevationDecision::Approved(_) => {}
                ElevationDecision::Pending { grant_id } => return Err(ToolError::ElevationPending { grant_id }),
            }
        }

        Ok(())
    }

    /// Dispatches to the registered executor without a permission check;
    /// only called after `check_permission` has already succeeded, kept
    /// separate so a caller can release the permission lock before running
    /// a (possibly slow) tool body.
    pub(crate) async fn dispatch(&self, name: &str, args: Value) -> PaiResult<ToolResult> {
        let registered = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool { name: name.to_string() })?;
        Ok(registered.executor.execute(args).await)
    }

    /// Runs `check_permission` then dispatches to the registered executor.
    /// Does not run the security validator; callers run that separately
    /// (spec.md §4.2 "runs the security validator" is the executor's job).
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        context: &mut PermissionContext,
        elevation: Option<&ElevationManager>,
        task_id: TaskId,
        now: Timestamp,
    ) -> PaiResult<ToolResult> {
        self.check_permission(name, context, elevation, task_id, now).await?;
        self.dispatch(name, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pai_core::{CapabilityCategory, EntityIdType};
    use pai_storage::MemoryKeyValueStore;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolExecutor for Echo {
        async fn execute(&self, args: Value) -> ToolResult {
            ToolResult::ok(args)
        }
    }

    fn now() -> Timestamp {
        Timestamp::from_timestamp(1000, 0).unwrap()
    }

    fn elevation() -> ElevationManager {
        ElevationManager::new(Arc::new(MemoryKeyValueStore::new()))
    }

    #[tokio::test]
    async fn execute_runs_a_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new("echo", "echoes args", json!({})), Arc::new(Echo));
        let mut context = PermissionContext::new("build", 1);

        let result = registry.execute("echo", json!({"x": 1}), &mut context, None, TaskId::now_v7(), now()).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn execute_rejects_unknown_tool() {
        let registry = ToolRegistry::new();
        let mut context = PermissionContext::new("build", 1);
        let err = registry.execute("nope", json!({}), &mut context, None, TaskId::now_v7(), now()).await.unwrap_err();
        assert!(matches!(err, pai_core::PaiError::Tool(ToolError::UnknownTool { .. })));
    }

    #[tokio::test]
    async fn execute_rejects_insufficient_level_with_no_elevation_manager() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new("deploy", "deploys", json!({})).with_required_level(3), Arc::new(Echo));
        let mut context = PermissionContext::new("build", 1);

        let err = registry.execute("deploy", json!({}), &mut context, None, TaskId::now_v7(), now()).await.unwrap_err();
        assert!(matches!(err, pai_core::PaiError::Tool(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn execute_rejects_disallowed_capability() {
        let mut registry = ToolRegistry::new();
        registry.register(
            Tool::new("execute_shell", "runs shell", json!({})).with_capability(CapabilityCategory::System),
            Arc::new(Echo),
        );
        let mut context = PermissionContext::new("build", 1).with_allowed_capabilities([CapabilityCategory::File]);

        let err = registry.execute("execute_shell", json!({}), &mut context, None, TaskId::now_v7(), now()).await.unwrap_err();
        assert!(matches!(err, pai_core::PaiError::Tool(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn execute_auto_elevates_a_small_gap_instead_of_failing_closed() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new("list_files", "lists", json!({})).with_required_level(2), Arc::new(Echo));
        let mut context = PermissionContext::new("build", 1);
        let elevation = elevation();

        let result = registry
            .execute("list_files", json!({}), &mut context, Some(&elevation), TaskId::now_v7(), now())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(context.current_level(now()), 2);
    }

    #[tokio::test]
    async fn execute_leaves_a_large_gap_pending_rather_than_denying_outright() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new("deploy", "deploys", json!({})).with_required_level(3), Arc::new(Echo));
        let mut context = PermissionContext::new("build", 1);
        let elevation = elevation();

        let err = registry
            .execute("deploy", json!({}), &mut context, Some(&elevation), TaskId::now_v7(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, pai_core::PaiError::Tool(ToolError::ElevationPending { .. })));
    }

    #[test]
    fn schemas_filter_by_level_and_capability() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new("list_files", "lists", json!({})).with_required_level(1), Arc::new(Echo));
        registry.register(Tool::new("deploy", "deploys", json!({})).with_required_level(3), Arc::new(Echo));
        let context = PermissionContext::new("build", 1);

        let schemas = registry.schemas(&context, now());
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "list_files");
    }
}
