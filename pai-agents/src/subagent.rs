//! Subagent (spec.md §4.5): a focused, bounded-iteration instance sharing
//! its parent's LLM and (possibly filtered) tool registry, with no pub/sub,
//! task control, or memory-trace side effects.

use crate::executor::{execute_batch, ToolCall};
use crate::registry::ToolRegistry;
use crate::security::SecurityValidator;
use pai_core::{
    ChatRequest, ContentBlock, ConversationMessage, EntityIdType, LlmClient, ModelTier, PaiResult,
    PermissionContext, StopReason, TaskId, Timestamp, Usage,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_SUBAGENT_ITERATION_CAP: u32 = 15;

/// spec.md §4.5: `SubagentResult{success, response, iterations, tool_calls_made, error?}`.
#[derive(Debug, Clone)]
pub struct SubagentResult {
    pub success: bool,
    pub response: String,
    pub iterations: u32,
    pub tool_calls_made: u32,
    pub error: Option<String>,
}

/// A read-only-filtered registry view, used for Explore-type subagents
/// (spec.md §4.5 "e.g., for Explore = a read-only subset").
pub fn read_only_view(registry: &ToolRegistry) -> Vec<&pai_core::Tool> {
    registry.list().into_iter().filter(|t| !t.side_effects).collect()
}

pub struct Subagent {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    security: SecurityValidator,
    context: Mutex<PermissionContext>,
    iteration_cap: u32,
}

impl Subagent {
    pub fn new(llm: Arc<dyn LlmClient>, registry: Arc<ToolRegistry>, context: PermissionContext, requested_cap: Option<u32>) -> Self {
        let iteration_cap = requested_cap.map(|cap| cap.min(DEFAULT_SUBAGENT_ITERATION_CAP)).unwrap_or(DEFAULT_SUBAGENT_ITERATION_CAP);
        Self { llm, registry, security: SecurityValidator::with_default_rules(), context: Mutex::new(context), iteration_cap }
    }

    /// Runs a fresh conversation seeded with `task`, bounded by the hard
    /// iteration cap, implementing the same tool-use loop as the Agent
    /// Runtime minus publishing, task control, and memory traces. Subagents
    /// never elevate (spec.md §4.5 bounds them to their seeded permission
    /// level, so `execute_batch` is always given `elevation: None`).
    pub async fn run(&self, task: impl Into<String>, now: Timestamp) -> PaiResult<SubagentResult> {
        let mut history = vec![ConversationMessage::user(task.into())];
        let mut usage = Usage::default();
        let mut tool_calls_made = 0u32;
        let schemas = {
            let context = self.context.lock().await;
            self.registry.schemas(&context, now).into_iter().collect::<Vec<_>>()
        };

        for iteration in 1..=self.iteration_cap {
            let chat_response = match self
                .llm
                .create_message(ChatRequest {
                    model_tier: ModelTier::Fast,
                    messages: history.clone(),
                    tools: Some(schemas.clone()),
                    system: None,
                    max_tokens: None,
                })
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    return Ok(SubagentResult {
                        success: false,
                        response: String::new(),
                        iterations: iteration,
                        tool_calls_made,
                        error: Some(err.to_string()),
                    })
                }
            };
            usage.accumulate(&chat_response.usage);

            match chat_response.stop_reason {
                StopReason::EndTurn => {
                    return Ok(SubagentResult {
                        success: true,
                        response: flatten_text(&chat_response.message),
                        iterations: iteration,
                        tool_calls_made,
                        error: None,
                    });
                }
                StopReason::ToolUse => {
                    let calls = extract_tool_calls(&chat_response.message);
                    tool_calls_made += calls.len() as u32;
                    let outcomes =
                        execute_batch(calls, &self.registry, &self.security, &self.context, None, TaskId::nil(), now).await;

                    history.push(chat_response.message);
                    history.push(ConversationMessage {
                        role: pai_core::MessageRole::User,
                        content: outcomes.into_iter().map(|o| o.into_content_block()).collect(),
                    });
                }
                _ => {
                    return Ok(SubagentResult {
                        success: true,
                        response: flatten_text(&chat_response.message),
                        iterations: iteration,
                        tool_calls_made,
                        error: None,
                    });
                }
            }
        }

        Ok(SubagentResult {
            success: false,
            response: String::new(),
            iterations: self.iteration_cap,
            tool_calls_made,
            error: Some("reached the subagent iteration cap before finishing".to_string()),
        })
    }
}

fn flatten_text(message: &ConversationMessage) -> String {
    message
        .content
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_tool_calls(message: &ConversationMessage) -> Vec<ToolCall> {
    message
        .content
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some(ToolCall { id: *id, name: name.clone(), args: input.clone() }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolExecutor;
    use async_trait::async_trait;
    use pai_core::{ChatResponse, EntityIdType, Tool, ToolCallId, ToolResult};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EndTurnClient;

    #[async_trait]
    impl LlmClient for EndTurnClient {
        async fn create_message(&self, _request: ChatRequest) -> PaiResult<ChatResponse> {
            Ok(ChatResponse {
                message: ConversationMessage::assistant(vec![ContentBlock::text("exploration complete")]),
                stop_reason: StopReason::EndTurn,
                usage: Usage::new(3, 2, 0, 0.0005),
            })
        }
        fn provider_id(&self) -> &str {
            "test"
        }
    }

    struct LoopingClient;

    #[async_trait]
    impl LlmClient for LoopingClient {
        async fn create_message(&self, _request: ChatRequest) -> PaiResult<ChatResponse> {
            Ok(ChatResponse {
                message: ConversationMessage::assistant(vec![ContentBlock::tool_use(ToolCallId::now_v7(), "list_files", json!({}))]),
                stop_reason: StopReason::ToolUse,
                usage: Usage::default(),
            })
        }
        fn provider_id(&self) -> &str {
            "test"
        }
    }

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

    #[tokio::test]
    async fn end_turn_returns_success_result() {
        let subagent = Subagent::new(Arc::new(EndTurnClient), Arc::new(ToolRegistry::new()), PermissionContext::new("explore", 1), None);
        let result = subagent.run("explore the repo", now()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.response, "exploration complete");
    }

    #[tokio::test]
    async fn requested_cap_is_clamped_to_fifteen() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new("list_files", "lists", json!({})).with_side_effects(false), Arc::new(Echo));
        let subagent = Subagent::new(Arc::new(LoopingClient), Arc::new(registry), PermissionContext::new("explore", 1), Some(1000));

        let result = subagent.run("loop forever", now()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.iterations, DEFAULT_SUBAGENT_ITERATION_CAP);
    }

    #[tokio::test]
    async fn lower_requested_cap_is_honored() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new("list_files", "lists", json!({})).with_side_effects(false), Arc::new(Echo));
        let subagent = Subagent::new(Arc::new(LoopingClient), Arc::new(registry), PermissionContext::new("explore", 1), Some(3));

        let result = subagent.run("loop a bit", now()).await.unwrap();
        assert_eq!(result.iterations, 3);
    }

    #[test]
    fn read_only_view_excludes_side_effecting_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new("list_files", "lists", json!({})).with_side_effects(false), Arc::new(Echo));
        registry.register(Tool::new("write_file", "writes", json!({})).with_side_effects(true), Arc::new(Echo));

        let view = read_only_view(&registry);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].name, "list_files");
    }
}
