//! Agent Runtime (spec.md §2 row L, §4.4): the per-agent-type tool-use loop.
//!
//! One `AgentRuntime` owns one agent type's conversation state, tool
//! registry, and permission context, and drives `process_task` against an
//! abstract `LlmClient` and `Bus`.

use crate::elevation::ElevationManager;
use crate::executor::{execute_batch, ToolCall};
use crate::registry::ToolRegistry;
use crate::security::SecurityValidator;
use async_trait::async_trait;
use pai_core::{
    AgentInstanceId, AgentRuntimeConfig, AgentState, AgentStatus, ChatRequest, ConversationId,
    ConversationMessage, EntityIdType, LlmClient, Learning, MemoryScope, ModelTier, PaiResult,
    Phase, PermissionContext, StopReason, TaskControlState, TaskId, TaskRequest,
    TaskResponse, Timestamp, ToolCallId, Usage, UserId,
};
use pai_context::{ContextManager, LlmBackedSummarizer};
use pai_events::Bus;
use pai_memory::MemorySystem;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info, instrument, warn};

/// External hook run before/after a task or a single tool call (spec.md
/// §4.4 step 3, §4.4 step g "pre-tool/post-tool plugin hook"). Default is a
/// no-op; callers inject real behavior (e.g. memory-backed context
/// injection) by implementing this trait.
#[async_trait]
pub trait RuntimeHooks: Send + Sync {
    async fn pre_task(&self, _request: &TaskRequest, _history: &mut Vec<ConversationMessage>) {}
    async fn post_task(&self, _request: &TaskRequest, _response: &TaskResponse) {}
    /// Returning `true` short-circuits the call as security-blocked.
    async fn pre_tool(&self, _name: &str, _args: &Value) -> bool {
        false
    }
    async fn post_tool(&self, _name: &str, _result_is_error: bool) {}
}

pub struct NoopHooks;

#[async_trait]
impl RuntimeHooks for NoopHooks {}

/// The outcome of one `process_task` call's inner loop, before it's wrapped
/// into a `TaskResponse` (spec.md §4.4 step 6 return shapes).
enum LoopOutcome {
    Done { text: String },
    MaxIterations,
    Cancelled,
}

/// spec.md §4.4: one runtime instance per agent type.
pub struct AgentRuntime {
    pub agent_type: String,
    instance_id: AgentInstanceId,
    llm: Arc<dyn LlmClient>,
    bus: Arc<dyn Bus>,
    registry: ToolRegistry,
    security: SecurityValidator,
    context_manager: ContextManager,
    summarizer: LlmBackedSummarizer,
    memory: Arc<MemorySystem>,
    hooks: Arc<dyn RuntimeHooks>,
    config: AgentRuntimeConfig,
    state: Mutex<AgentState>,
    permission: Mutex<PermissionContext>,
    elevation: Arc<ElevationManager>,
    pause_notify: Notify,
    plan_exploration: std::sync::atomic::AtomicBool,
}

impl AgentRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_type: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        bus: Arc<dyn Bus>,
        registry: ToolRegistry,
        memory: Arc<MemorySystem>,
        permission: PermissionContext,
        elevation: Arc<ElevationManager>,
        config: AgentRuntimeConfig,
        hooks: Arc<dyn RuntimeHooks>,
        now: Timestamp,
    ) -> Self {
        Self {
            agent_type: agent_type.into(),
            instance_id: AgentInstanceId::now_v7(),
            summarizer: LlmBackedSummarizer::new(llm.clone()),
            llm,
            bus,
            registry,
            security: SecurityValidator::with_default_rules(),
            context_manager: ContextManager::new(pai_core::ContextConfig::default()),
            memory,
            hooks,
            config,
            state: Mutex::new(AgentState::new(now)),
            permission: Mutex::new(permission),
            elevation,
            pause_notify: Notify::new(),
            plan_exploration: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn tasks_topic(&self) -> String {
        format!("agent:{}:tasks", self.agent_type)
    }

    /// spec.md §4.4 `start()`.
    pub async fn start(&self) -> PaiResult<()> {
        self.bus.subscribe(&self.tasks_topic()).await?;
        self.bus.subscribe("agent:task_control").await?;
        self.bus.subscribe("agent:pending_messages").await?;
        self.publish_status(AgentStatus::Idle).await?;
        Ok(())
    }

    /// spec.md §4.4 `stop(timeout)`: best-effort, since the caller decides
    /// when to stop waiting; this flushes memory and publishes OFFLINE.
    pub async fn stop(&self, task_id: Option<TaskId>, now: Timestamp) -> PaiResult<()> {
        self.memory.flush(task_id, now).await.ok();
        self.publish_status(AgentStatus::Offline).await?;
        Ok(())
    }

    async fn publish_status(&self, status: AgentStatus) -> PaiResult<()> {
        self.bus
            .publish("agent:status", json!({"agent_type": self.agent_type, "status": status.as_db_str()}))
            .await
    }

    async fn publish_action(&self, kind: &str, description: &str, user_id: Option<UserId>, conversation_id: Option<ConversationId>, now: Timestamp) -> PaiResult<()> {
        // spec.md §4.4 "only when a user is in scope".
        let Some(user_id) = user_id else { return Ok(()) };
        self.bus
            .publish(
                "agent:responses",
                json!({
                    "type": "action",
                    "action": kind,
                    "description": description,
                    "agent": self.agent_type,
                    "user_id": user_id.to_string(),
                    "conversation_id": conversation_id.map(|c| c.to_string()),
                    "timestamp": now.to_rfc3339(),
                }),
            )
            .await
    }

    /// Heartbeat body (spec.md §4.4 "Heartbeat"); intended to be called on a
    /// timer by the caller's runtime executor.
    pub async fn heartbeat(&self, now: Timestamp) -> PaiResult<()> {
        let state = self.state.lock().await;
        let payload = json!({
            "timestamp": now.to_rfc3339(),
            "status": state.status.as_db_str(),
            "current_task": state.current_task_id.map(|t| t.to_string()),
            "uptime_seconds": (now - state.start_time).num_seconds(),
            "tasks_completed": state.tasks_completed,
        });
        drop(state);
        self.bus.publish("agent:heartbeats", payload.clone()).await?;
        self.memory
            .hot
            .store_hot_with_ttl(&format!("agent:heartbeat:{}", self.agent_type), &payload, self.config.heartbeat_ttl_secs as i64)
            .await
    }

    pub async fn pause(&self) {
        let mut state = self.state.lock().await;
        state.pause();
    }

    pub async fn resume(&self) {
        let mut state = self.state.lock().await;
        state.resume();
        self.pause_notify.notify_waiters();
    }

    pub async fn cancel(&self) {
        let mut state = self.state.lock().await;
        state.cancel();
        self.pause_notify.notify_waiters();
    }

    pub async fn add_pending_message(&self, text: impl Into<String>, now: Timestamp) {
        let mut state = self.state.lock().await;
        state.enqueue_interrupt(text, now);
    }

    /// Restricts the next call's tool schemas to `side_effects=false` tools
    /// (spec.md §4.4 step d "plan exploration mode").
    pub fn set_plan_exploration(&self, enabled: bool) {
        self.plan_exploration.store(enabled, std::sync::atomic::Ordering::Relaxed);
    }

    /// spec.md §4.4 `process_task`: the full 9-step sequence.
    #[instrument(skip(self, request), fields(agent_type = %self.agent_type, task_id = %request.id))]
    pub async fn process_task(&self, request: TaskRequest, user_id: Option<UserId>, now: Timestamp) -> PaiResult<TaskResponse> {
        let started_at = now;
        let mut usage = Usage::default();

        // Step 1: IDLE -> BUSY.
        {
            let mut state = self.state.lock().await;
            state.begin_task(request.id);
            state.conversation_id = request.conversation_id;
            state.project_id = request.project_id;
            state.user_id = user_id;
        }

        // Step 2.
        self.publish_action("thinking", "Working on the request", user_id, request.conversation_id, now).await?;

        // Step 4: load or reset conversation history.
        let mut history = self.load_or_reset_history(&request).await?;

        // Step 3: pre-task hook may inject learnings into history.
        self.hooks.pre_task(&request, &mut history).await;
        {
            let mut state = self.state.lock().await;
            state.history = history;
        }

        // Step 5: OBSERVE, THINK, PLAN traces.
        for phase in [Phase::Observe, Phase::Think, Phase::Plan] {
            self.memory.store_task_trace(request.id, phase, &json!({"task_type": request.task_type})).await.ok();
        }

        let iteration_cap = request.iteration_cap.unwrap_or(self.config.max_tool_iterations);

        // Step 6: the agentic loop.
        let loop_result = self.agentic_loop(&request, iteration_cap, user_id, &mut usage, now).await;

        let (response, iterations) = match loop_result {
            Ok((LoopOutcome::Done { text }, iterations)) => {
                self.memory.store_task_trace(request.id, Phase::Verify, &json!({"outcome": "completed"})).await.ok();
                self.hooks.post_task(&request, &TaskResponse::completed(request.id, &self.agent_type, &text, iterations, usage, 0)).await;
                self.publish_action("complete", "Finished the task", user_id, request.conversation_id, now).await?;
                let duration_ms = (chrono::Utc::now() - started_at).num_milliseconds();
                (TaskResponse::completed(request.id, &self.agent_type, text, iterations, usage, duration_ms), iterations)
            }
            Ok((LoopOutcome::Cancelled, iterations)) => {
                (TaskResponse::cancelled(request.id, &self.agent_type, iterations, usage), iterations)
            }
            Ok((LoopOutcome::MaxIterations, iterations)) => {
                let mut response = TaskResponse::completed(
                    request.id,
                    &self.agent_type,
                    "Task incomplete: reached the iteration limit before finishing",
                    iterations,
                    usage,
                    0,
                );
                response.outcome = pai_core::TaskOutcome::MaxIterations;
                (response, iterations)
            }
            Err(err) => {
                // Step 8: record VERIFY error trace and an error-category Learning.
                self.memory.store_task_trace(request.id, Phase::Verify, &json!({"outcome": "failed", "error": err.to_string()})).await.ok();
                let permission_level = self.permission.lock().await.base_level;
                let mut learning = Learning::new(
                    format!("Task {} failed: {}", request.id, err),
                    Phase::Verify,
                    "error",
                    self.instance_id,
                    MemoryScope::Global,
                    now,
                );
                learning.required_permission_level = permission_level;
                self.memory.store_learning(learning, true).await.ok();
                self.publish_action("error", &err.to_string(), user_id, request.conversation_id, now).await?;
                error!(error = %err, "task failed");
                (TaskResponse::failed(request.id, &self.agent_type, err.to_string(), 0, usage, 0), 0)
            }
        };

        // Step 9: always clear task state, publish IDLE, count completion.
        {
            let mut state = self.state.lock().await;
            state.clear_task();
            state.tasks_completed += 1;
        }
        self.publish_status(AgentStatus::Idle).await?;

        info!(iterations, outcome = ?response.outcome, "task finished");
        Ok(response)
    }

    async fn load_or_reset_history(&self, request: &TaskRequest) -> PaiResult<Vec<ConversationMessage>> {
        if request.is_chat() {
            if let Some(conversation_id) = request.conversation_id {
                let key = format!("conversation:{conversation_id}:history");
                if let Some(raw) = self.memory.hot.get_hot(&key).await? {
                    if let Ok(mut history) = serde_json::from_value::<Vec<ConversationMessage>>(raw) {
                        let preload = self.config.chat_history_preload_messages;
                        if history.len() > preload {
                            history = history.split_off(history.len() - preload);
                        }
                        return Ok(history);
                    }
                }
            }
        }
        Ok(Vec::new())
    }

    /// spec.md §4.4 "Agentic loop (iteration body)": steps a-h.
    async fn agentic_loop(
        &self,
        request: &TaskRequest,
        iteration_cap: u32,
        user_id: Option<UserId>,
        usage: &mut Usage,
        now: Timestamp,
    ) -> PaiResult<(LoopOutcome, u32)> {
        for iteration in 1..=iteration_cap {
            // Step a: task control check.
            loop {
                let control = self.state.lock().await.control_state;
                match control {
                    TaskControlState::Cancelled => return Ok((LoopOutcome::Cancelled, iteration)),
                    TaskControlState::Paused => self.pause_notify.notified().await,
                    _ => break,
                }
            }

            // Step b: drain pending messages.
            {
                let mut state = self.state.lock().await;
                state.drain_pending_into_history();
            }

            // Step c: build API messages (context compaction).
            let history = {
                let state = self.state.lock().await;
                state.history.clone()
            };
            let compacted = self.context_manager.compact(history, &self.summarizer).await?;
            {
                let mut state = self.state.lock().await;
                state.history = compacted.clone();
            }

            // Step d: tool schemas filtered by effective level (and plan-exploration mode).
            let all_schemas = {
                let permission = self.permission.lock().await;
                self.registry.schemas(&permission, now)
            };
            let schemas = if self.plan_exploration.load(std::sync::atomic::Ordering::Relaxed) {
                all_schemas
                    .into_iter()
                    .filter(|s| self.registry.get(&s.name).map(|t| !t.side_effects).unwrap_or(false))
                    .collect()
            } else {
                all_schemas
            };

            // Step e/f: call the LLM, spec.md §4.4 step e `model="auto"`.
            // `pai_core::ModelTier` has no literal `auto` variant; this repo
            // resolves the Open Question by routing "auto" to `Balanced`
            // (see DESIGN.md).
            self.publish_action("api_call", "Calling the model", user_id, request.conversation_id, now).await?;
            let chat_response = self
                .llm
                .create_message(ChatRequest {
                    model_tier: ModelTier::Balanced,
                    messages: compacted,
                    tools: Some(schemas),
                    system: None,
                    max_tokens: None,
                })
                .await?;
            usage.accumulate(&chat_response.usage);
            self.publish_action(
                "api_response",
                &format!("total_tokens={} cost={:.4}", chat_response.usage.input_tokens + chat_response.usage.output_tokens, chat_response.usage.total_cost),
                user_id,
                request.conversation_id,
                now,
            )
            .await?;

            // Step g: switch on stop reason.
            match chat_response.stop_reason {
                StopReason::EndTurn => {
                    let text = flatten_text(&chat_response.message);
                    return Ok((LoopOutcome::Done { text }, iteration));
                }
                StopReason::ToolUse => {
                    let calls = extract_tool_calls(&chat_response.message);
                    let outcomes = self.run_tool_calls(calls, request, user_id, now).await?;

                    let mut state = self.state.lock().await;
                    state.history.push(chat_response.message.clone());
                    state.history.push(ConversationMessage {
                        role: pai_core::MessageRole::User,
                        content: outcomes.into_iter().map(|o| o.into_content_block()).collect(),
                    });
                    drop(state);

                    self.memory
                        .store_task_trace(request.id, Phase::Execute, &json!({"iteration": iteration}))
                        .await
                        .ok();
                }
                _ => {
                    warn!(stop_reason = ?chat_response.stop_reason, "unhandled stop reason, exiting loop");
                    let text = flatten_text(&chat_response.message);
                    return Ok((LoopOutcome::Done { text }, iteration));
                }
            }
        }

        // Step h.
        Ok((LoopOutcome::MaxIterations, iteration_cap))
    }

    async fn run_tool_calls(
        &self,
        calls: Vec<ToolCall>,
        request: &TaskRequest,
        user_id: Option<UserId>,
        now: Timestamp,
    ) -> PaiResult<Vec<crate::executor::ToolCallOutcome>> {
        for call in &calls {
            self.publish_action("tool_call", &call.name, user_id, request.conversation_id, now).await?;
            self.bus.publish("agent:tool_calls", json!({"task_id": request.id.to_string(), "tool": call.name, "args": call.args})).await?;

            if self.hooks.pre_tool(&call.name, &call.args).await {
                warn!(tool = %call.name, "pre-tool hook blocked call");
            }
        }

        let outcomes = execute_batch(
            calls,
            &self.registry,
            &self.security,
            &self.permission,
            Some(&self.elevation),
            request.id,
            now,
        )
        .await;

        for outcome in &outcomes {
            let topic = if outcome.is_error { "tool_error" } else { "tool_result" };
            self.publish_action(topic, &outcome.name, user_id, request.conversation_id, now).await?;
            self.bus
                .publish(
                    "agent:tool_results",
                    json!({"task_id": request.id.to_string(), "tool": outcome.name, "is_error": outcome.is_error}),
                )
                .await?;
            self.hooks.post_tool(&outcome.name, outcome.is_error).await;
        }

        Ok(outcomes)
    }
}

fn flatten_text(message: &ConversationMessage) -> String {
    message
        .content
        .iter()
        .filter_map(|b| match b {
            pai_core::ContentBlock::Text { text } => Some(text.clone()),
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
            pai_core::ContentBlock::ToolUse { id, name, input } => {
                Some(ToolCall { id: *id, name: name.clone(), args: input.clone() })
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolExecutor;
    use pai_core::{ChatResponse, CapabilityCategory, EntityIdType, Tool, ToolResult};
    use pai_events::InMemoryBus;
    use pai_storage::{MemoryKeyValueStore, MemoryVectorStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct HashEmbedder;

    #[async_trait]
    impl pai_core::EmbeddingProvider for HashEmbedder {
        async fn embed(&self, text: &str) -> PaiResult<pai_core::EmbeddingVector> {
            let hash = pai_core::compute_content_hash(text.as_bytes());
            Ok(pai_core::EmbeddingVector::new(hash.iter().take(4).map(|b| *b as f32).collect(), "hash"))
        }
        async fn embed_batch(&self, texts: &[&str]) -> PaiResult<Vec<pai_core::EmbeddingVector>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }
        fn dimensions(&self) -> i32 {
            4
        }
        fn model_id(&self) -> &str {
            "hash"
        }
    }

    /// An `LlmClient` double that replies `end_turn` immediately, used for
    /// the S1 round-trip scenario and plain completion tests.
    struct EndTurnClient;

    #[async_trait]
    impl LlmClient for EndTurnClient {
        async fn create_message(&self, _request: ChatRequest) -> PaiResult<ChatResponse> {
            Ok(ChatResponse {
                message: ConversationMessage::assistant(vec![pai_core::ContentBlock::text("all done")]),
                stop_reason: StopReason::EndTurn,
                usage: Usage::new(10, 5, 0, 0.001),
            })
        }
        fn provider_id(&self) -> &str {
            "test"
        }
    }

    /// Replies `tool_use` once, then `end_turn` (spec.md §8 S1).
    struct OneToolThenDoneClient {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for OneToolThenDoneClient {
        async fn create_message(&self, _request: ChatRequest) -> PaiResult<ChatResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Ok(ChatResponse {
                    message: ConversationMessage::assistant(vec![pai_core::ContentBlock::tool_use(
                        ToolCallId::now_v7(),
                        "echo",
                        json!({"x": 1}),
                    )]),
                    stop_reason: StopReason::ToolUse,
                    usage: Usage::new(20, 10, 0, 0.002),
                })
            } else {
                Ok(ChatResponse {
                    message: ConversationMessage::assistant(vec![pai_core::ContentBlock::text("tool result incorporated")]),
                    stop_reason: StopReason::EndTurn,
                    usage: Usage::new(5, 5, 0, 0.001),
                })
            }
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

    fn memory_system() -> Arc<MemorySystem> {
        let kv: Arc<dyn pai_storage::KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let learnings: Arc<dyn pai_storage::VectorStore> = Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder)));
        let skills: Arc<dyn pai_storage::VectorStore> = Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder)));
        Arc::new(MemorySystem::new(kv, learnings, skills, std::env::temp_dir(), pai_core::MemoryConfig::default()))
    }

    fn now() -> Timestamp {
        Timestamp::from_timestamp(10_000, 0).unwrap()
    }

    fn elevation_manager() -> Arc<ElevationManager> {
        Arc::new(ElevationManager::new(Arc::new(MemoryKeyValueStore::new())))
    }

    #[tokio::test]
    async fn end_turn_completes_in_one_iteration() {
        let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::new());
        let runtime = AgentRuntime::new(
            "build",
            Arc::new(EndTurnClient),
            bus,
            ToolRegistry::new(),
            memory_system(),
            PermissionContext::new("build", 1),
            elevation_manager(),
            AgentRuntimeConfig::default(),
            Arc::new(NoopHooks),
            now(),
        );

        let request = TaskRequest::new("chat", "build");
        let response = runtime.process_task(request, None, now()).await.unwrap();
        assert_eq!(response.outcome, pai_core::TaskOutcome::Completed);
        assert_eq!(response.iterations, 1);
        assert_eq!(response.usage.input_tokens, 10);
    }

    #[tokio::test]
    async fn plan_exploration_mode_filters_schemas_to_read_only_tools() {
        let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::new());
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new("list_files", "lists", json!({})).with_side_effects(false), Arc::new(Echo));
        registry.register(Tool::new("write_file", "writes", json!({})).with_side_effects(true), Arc::new(Echo));

        let runtime = AgentRuntime::new(
            "plan",
            Arc::new(EndTurnClient),
            bus,
            registry,
            memory_system(),
            PermissionContext::new("plan", 1),
            elevation_manager(),
            AgentRuntimeConfig::default(),
            Arc::new(NoopHooks),
            now(),
        );
        runtime.set_plan_exploration(true);

        let request = TaskRequest::new("chat", "plan");
        let response = runtime.process_task(request, None, now()).await.unwrap();
        assert_eq!(response.outcome, pai_core::TaskOutcome::Completed);
    }

    #[tokio::test]
    async fn tool_use_round_trip_then_end_turn() {
        let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::new());
        let mut registry = ToolRegistry::new();
        registry.register(Tool::new("echo", "echoes", json!({})).with_side_effects(false), Arc::new(Echo));

        let runtime = AgentRuntime::new(
            "build",
            Arc::new(OneToolThenDoneClient { calls: AtomicUsize::new(0) }),
            bus,
            registry,
            memory_system(),
            PermissionContext::new("build", 1),
            elevation_manager(),
            AgentRuntimeConfig::default(),
            Arc::new(NoopHooks),
            now(),
        );

        let request = TaskRequest::new("chat", "build");
        let response = runtime.process_task(request, None, now()).await.unwrap();
        assert_eq!(response.outcome, pai_core::TaskOutcome::Completed);
        assert_eq!(response.iterations, 2);
        assert_eq!(response.result.as_deref(), Some("tool result incorporated"));
    }

    #[tokio::test]
    async fn cancel_before_loop_starts_returns_cancelled_outcome() {
        let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::new());
        let runtime = AgentRuntime::new(
            "build",
            Arc::new(EndTurnClient),
            bus,
            ToolRegistry::new(),
            memory_system(),
            PermissionContext::new("build", 1),
            elevation_manager(),
            AgentRuntimeConfig::default(),
            Arc::new(NoopHooks),
            now(),
        );

        runtime.cancel().await;
        let request = TaskRequest::new("chat", "build");
        let response = runtime.process_task(request, None, now()).await.unwrap();
        assert_eq!(response.outcome, pai_core::TaskOutcome::Cancelled);
    }

    #[tokio::test]
    async fn security_blocked_tool_never_reaches_its_body() {
        let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::new());
        let count = Arc::new(AtomicUsize::new(0));

        struct Counting(Arc<AtomicUsize>);
        #[async_trait]
        impl ToolExecutor for Counting {
            async fn execute(&self, _args: Value) -> ToolResult {
                self.0.fetch_add(1, Ordering::SeqCst);
                ToolResult::ok(json!({}))
            }
        }

        struct ShellCallThenDoneClient {
            calls: AtomicUsize,
        }
        #[async_trait]
        impl LlmClient for ShellCallThenDoneClient {
            async fn create_message(&self, _request: ChatRequest) -> PaiResult<ChatResponse> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Ok(ChatResponse {
                        message: ConversationMessage::assistant(vec![pai_core::ContentBlock::tool_use(
                            ToolCallId::now_v7(),
                            "execute_shell",
                            json!({"command": "ls; rm -rf /"}),
                        )]),
                        stop_reason: StopReason::ToolUse,
                        usage: Usage::default(),
                    })
                } else {
                    Ok(ChatResponse {
                        message: ConversationMessage::assistant(vec![pai_core::ContentBlock::text("done")]),
                        stop_reason: StopReason::EndTurn,
                        usage: Usage::default(),
                    })
                }
            }
            fn provider_id(&self) -> &str {
                "test"
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(
            Tool::new("execute_shell", "runs shell", json!({}))
                .with_capability(CapabilityCategory::System)
                .with_side_effects(true),
            Arc::new(Counting(count.clone())),
        );

        let runtime = AgentRuntime::new(
            "build",
            Arc::new(ShellCallThenDoneClient { calls: AtomicUsize::new(0) }),
            bus,
            registry,
            memory_system(),
            PermissionContext::new("build", 5),
            elevation_manager(),
            AgentRuntimeConfig::default(),
            Arc::new(NoopHooks),
            now(),
        );

        let request = TaskRequest::new("chat", "build");
        runtime.process_task(request, None, now()).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
