//! PAI Test Utilities
//!
//! Centralized test infrastructure for the PAI workspace:
//! - In-memory fakes for the Bus, KV store, Vector store, and LLM client
//!   (spec.md's higher crates are testable without network or real databases)
//! - Proptest generators for the core entity types
//! - Fixtures for common test scenarios
//! - Custom assertions for PAI-specific result types

// Re-export the in-memory fakes from their owning crates rather than
// duplicating them here.
pub use pai_events::InMemoryBus;
pub use pai_storage::{MemoryKeyValueStore, MemoryVectorStore};

pub use pai_core::{
    AgentInstanceId, AgentRuntimeConfig, AgentState, AgentStatus, CapabilityCategory, ChatRequest,
    ChatResponse, ContentBlock, ConversationId, ConversationMessage, DomainId, ElevationGrant,
    ElevationGrantId, EmbeddingProvider, EmbeddingVector, EntityIdType, Learning, LearningId,
    LlmClient, MemoryScope, MessageRole, ModelTier, PaiError, PaiResult, Phase, Predicate,
    ProjectId, Sensitivity, Skill, SkillAbstractionLevel, SkillId, StopReason, TaskControlState,
    TaskId, TaskOutcome, TaskRequest, TaskResponse, Timestamp, Tool, ToolCallId, ToolError,
    ToolResult, ToolSchema, Usage, UserId,
};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

// ============================================================================
// MOCK PROVIDERS
// ============================================================================

/// A deterministic embedding provider for tests (grounded on the ad-hoc
/// `HashEmbedder` doubles written inline across `pai-agents`/`pai-memory`
/// tests): hashes the input text and projects the digest onto `dimensions`
/// floats, so equal inputs always embed identically without a real model.
#[derive(Debug, Clone)]
pub struct FakeEmbeddingProvider {
    model_id: String,
    dimensions: i32,
}

impl FakeEmbeddingProvider {
    pub fn new(model_id: impl Into<String>, dimensions: i32) -> Self {
        Self { model_id: model_id.into(), dimensions }
    }
}

impl Default for FakeEmbeddingProvider {
    fn default() -> Self {
        Self::new("fake-embedder", 8)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbeddingProvider {
    async fn embed(&self, text: &str) -> PaiResult<EmbeddingVector> {
        let hash = pai_core::compute_content_hash(text.as_bytes());
        let dims = self.dimensions.max(1) as usize;
        let data = (0..dims).map(|i| hash[i % hash.len()] as f32 / 255.0).collect();
        Ok(EmbeddingVector::new(data, self.model_id.clone()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> PaiResult<Vec<EmbeddingVector>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// A scriptable `LlmClient` double (grounded on `pai-llm`'s `EchoClient`/
/// `AlwaysFailClient` test doubles): replays a fixed queue of responses in
/// order, falling back to a final `end_turn` reply once the queue is
/// exhausted so a test that over-calls it doesn't panic mid-loop.
pub struct ScriptedLlmClient {
    responses: Mutex<Vec<ChatResponse>>,
    calls: AtomicUsize,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self { responses: Mutex::new(responses), calls: AtomicUsize::new(0) }
    }

    /// A single-response client that immediately ends the turn with `text`.
    pub fn end_turn(text: impl Into<String>) -> Self {
        Self::new(vec![ChatResponse {
            message: ConversationMessage::assistant(vec![ContentBlock::text(text)]),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        }])
    }

    pub fn calls_made(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn create_message(&self, _request: ChatRequest) -> PaiResult<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.responses.lock().await;
        if queue.is_empty() {
            return Ok(ChatResponse {
                message: ConversationMessage::assistant(vec![ContentBlock::text("done")]),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            });
        }
        Ok(queue.remove(0))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

/// An `LlmClient` double that always fails with the given error, for
/// exercising a runtime's error path without a live provider.
pub struct AlwaysFailLlmClient {
    pub error: pai_core::LlmError,
}

impl AlwaysFailLlmClient {
    pub fn new(error: pai_core::LlmError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl LlmClient for AlwaysFailLlmClient {
    async fn create_message(&self, _request: ChatRequest) -> PaiResult<ChatResponse> {
        Err(PaiError::Llm(self.error.clone()))
    }

    fn provider_id(&self) -> &str {
        "always-fail"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating PAI entity types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID (for generic ID generation).
    pub fn arb_uuid() -> impl Strategy<Value = uuid::Uuid> {
        any::<[u8; 16]>().prop_map(uuid::Uuid::from_bytes)
    }

    pub fn arb_task_id() -> impl Strategy<Value = TaskId> {
        arb_uuid().prop_map(TaskId::new)
    }

    pub fn arb_agent_instance_id() -> impl Strategy<Value = AgentInstanceId> {
        arb_uuid().prop_map(AgentInstanceId::new)
    }

    pub fn arb_learning_id() -> impl Strategy<Value = LearningId> {
        arb_uuid().prop_map(LearningId::new)
    }

    /// Generate a Timestamp within a reasonable range (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(chrono::Utc::now)
        })
    }

    pub fn arb_memory_scope() -> impl Strategy<Value = MemoryScope> {
        prop_oneof![Just(MemoryScope::Global), Just(MemoryScope::Project), Just(MemoryScope::Domain)]
    }

    pub fn arb_sensitivity() -> impl Strategy<Value = Sensitivity> {
        prop_oneof![Just(Sensitivity::Public), Just(Sensitivity::Internal), Just(Sensitivity::Restricted)]
    }

    pub fn arb_capability_category() -> impl Strategy<Value = CapabilityCategory> {
        prop_oneof![
            Just(CapabilityCategory::System),
            Just(CapabilityCategory::File),
            Just(CapabilityCategory::Network),
            Just(CapabilityCategory::Code),
            Just(CapabilityCategory::Web),
            Just(CapabilityCategory::Monitoring),
        ]
    }

    pub fn arb_phase() -> impl Strategy<Value = Phase> {
        prop_oneof![
            Just(Phase::Observe),
            Just(Phase::Think),
            Just(Phase::Plan),
            Just(Phase::Build),
            Just(Phase::Execute),
            Just(Phase::Verify),
            Just(Phase::Learn),
        ]
    }

    pub fn arb_skill_abstraction_level() -> impl Strategy<Value = SkillAbstractionLevel> {
        prop_oneof![
            Just(SkillAbstractionLevel::Primitive),
            Just(SkillAbstractionLevel::Skill),
            Just(SkillAbstractionLevel::Workflow),
        ]
    }

    pub fn arb_model_tier() -> impl Strategy<Value = ModelTier> {
        prop_oneof![Just(ModelTier::Fast), Just(ModelTier::Balanced), Just(ModelTier::Powerful)]
    }

    /// Generate an EmbeddingVector with specified dimensions.
    pub fn arb_embedding_vector(dimensions: usize) -> impl Strategy<Value = EmbeddingVector> {
        (prop::collection::vec(-1.0f32..1.0f32, dimensions), "[a-z]{3,10}")
            .prop_map(|(data, model_id)| EmbeddingVector::new(data, model_id))
    }

    /// Generate a Learning with a random id/content/category, fixed creator
    /// and scope supplied by the caller (most invariants - e.g. scope=Project
    /// requiring a project id - are the caller's to satisfy).
    pub fn arb_learning(creator_agent: AgentInstanceId, scope: MemoryScope) -> impl Strategy<Value = Learning> {
        (
            "[a-zA-Z0-9 .,!?]{1,200}",
            arb_phase(),
            "[a-z_]{3,20}",
            0.0f32..1.0f32,
            arb_timestamp(),
        )
            .prop_map(move |(content, phase, category, confidence, now)| {
                let mut learning = Learning::new(content, phase, category, creator_agent, scope, now);
                learning.confidence = confidence;
                learning
            })
    }

    /// Generate a TaskRequest for a given task type / target agent type.
    pub fn arb_task_request(task_type: &'static str, target_agent_type: &'static str) -> impl Strategy<Value = TaskRequest> {
        prop::option::of(1u32..50).prop_map(move |iteration_cap| {
            let mut request = TaskRequest::new(task_type, target_agent_type);
            request.iteration_cap = iteration_cap;
            request
        })
    }

    /// Generate a PermissionContext with a random base level in `0..=5`.
    pub fn arb_permission_context(agent_type: &'static str) -> impl Strategy<Value = pai_core::PermissionContext> {
        (0u8..=5).prop_map(move |base_level| pai_core::PermissionContext::new(agent_type, base_level))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// A fixed instant used across fixtures so tests stay deterministic
    /// without calling `Utc::now()` (which is unavailable in replayed runs).
    pub fn now() -> Timestamp {
        Timestamp::from_timestamp(1_700_000_000, 0).unwrap()
    }

    /// A minimal `AgentRuntimeConfig` with small caps, suitable for fast
    /// tests that want to exercise the max-iterations path quickly.
    pub fn tight_runtime_config(max_tool_iterations: u32) -> AgentRuntimeConfig {
        let mut config = AgentRuntimeConfig::default();
        config.max_tool_iterations = max_tool_iterations;
        config
    }

    /// A read-only tool with no capability tag, useful as a stand-in for
    /// "list"/"search"-style tools in registry tests.
    pub fn read_only_tool(name: impl Into<String>) -> Tool {
        Tool::new(name, "a read-only test tool", serde_json::json!({})).with_side_effects(false)
    }

    /// A side-effecting tool tagged with `capability`, useful for security
    /// validator and elevation tests.
    pub fn side_effecting_tool(name: impl Into<String>, capability: CapabilityCategory) -> Tool {
        Tool::new(name, "a side-effecting test tool", serde_json::json!({}))
            .with_side_effects(true)
            .with_capability(capability)
    }

    /// A minimal completed Learning for memory-tier tests.
    pub fn sample_learning(creator_agent: AgentInstanceId) -> Learning {
        Learning::new("sample learning content", Phase::Verify, "general", creator_agent, MemoryScope::Global, now())
    }

    /// A minimal chat TaskRequest targeting `agent_type`.
    pub fn chat_task_request(agent_type: impl Into<String>) -> TaskRequest {
        TaskRequest::new("chat", agent_type)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for PAI-specific result and outcome types.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &PaiResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &PaiResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    #[track_caller]
    pub fn assert_tool_error<T: std::fmt::Debug>(result: &PaiResult<T>) {
        match result {
            Err(PaiError::Tool(_)) => {}
            other => panic!("Expected Tool error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_permission_denied<T: std::fmt::Debug>(result: &PaiResult<T>) {
        match result {
            Err(PaiError::Tool(ToolError::PermissionDenied { .. })) => {}
            other => panic!("Expected PermissionDenied error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_memory_error<T: std::fmt::Debug>(result: &PaiResult<T>) {
        match result {
            Err(PaiError::Memory(_)) => {}
            other => panic!("Expected Memory error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_llm_error<T: std::fmt::Debug>(result: &PaiResult<T>) {
        match result {
            Err(PaiError::Llm(_)) => {}
            other => panic!("Expected Llm error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_task_completed(response: &TaskResponse) {
        assert_eq!(response.outcome, TaskOutcome::Completed, "expected Completed, got {:?}", response.outcome);
    }

    #[track_caller]
    pub fn assert_task_failed(response: &TaskResponse) {
        assert_eq!(response.outcome, TaskOutcome::Failed, "expected Failed, got {:?}", response.outcome);
    }

    #[track_caller]
    pub fn assert_task_cancelled(response: &TaskResponse) {
        assert_eq!(response.outcome, TaskOutcome::Cancelled, "expected Cancelled, got {:?}", response.outcome);
    }

    #[track_caller]
    pub fn assert_valid_embedding(embedding: &EmbeddingVector) {
        assert!(
            embedding.is_valid(),
            "Invalid embedding: dimensions={}, data.len()={}",
            embedding.dimensions,
            embedding.data.len()
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
