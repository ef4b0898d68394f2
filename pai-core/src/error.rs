//! Error types for the agent execution core and memory pipeline.

use crate::{ElevationGrantId, TaskId, ToolCallId};
use thiserror::Error;

/// Tool registry / permission errors (spec.md §4.1, §7).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Security blocked: {reason}")]
    SecurityBlocked { reason: String },

    #[error("Elevation pending approval: grant {grant_id}")]
    ElevationPending { grant_id: ElevationGrantId },

    #[error("Tool '{name}' raised an exception: {message}")]
    ToolPanicked { name: String, message: String },
}

/// Context manager / summarizer errors (spec.md §4.3).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("No safe truncation point found in history of {len} messages")]
    NoSafeTruncationPoint { len: usize },

    #[error("Summarization failed: {reason}")]
    SummarizationFailed { reason: String },

    #[error("Orphaned tool_result block for tool_use_id {tool_use_id}")]
    OrphanedToolResult { tool_use_id: ToolCallId },
}

/// LLM transport errors (spec.md §2 row A, §7).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No LLM provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited { provider: String, retry_after_ms: i64 },

    #[error("Circuit breaker open for provider {provider}")]
    CircuitOpen { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Embedding failed: {reason}")]
    EmbeddingFailed { reason: String },
}

/// Memory tier errors (spec.md §4.6-§4.9, §7 "Memory store errors").
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Vector store error: {reason}")]
    VectorStore { reason: String },

    #[error("Key-value store error: {reason}")]
    KeyValueStore { reason: String },

    #[error("Cold archive I/O error: {reason}")]
    ColdArchive { reason: String },

    #[error("Rejected by quality gate: {reason}")]
    QualityGateRejected { reason: String },

    #[error("Learning {id} not found")]
    NotFound { id: String },

    #[error("Invalid scope: {reason}")]
    InvalidScope { reason: String },
}

/// Bus (pub/sub) errors (spec.md §2 row B).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("Topic {topic} has no subscribers")]
    NoSubscribers { topic: String },

    #[error("Publish to {topic} failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("Subscription closed for {topic}")]
    SubscriptionClosed { topic: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Agent runtime errors not otherwise covered (spec.md §4.4, §7).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("Task {task_id} exceeded max_iterations")]
    MaxIterationsExceeded { task_id: TaskId },

    #[error("Task {task_id} is not currently running")]
    TaskNotRunning { task_id: TaskId },

    #[error("Graceful shutdown timed out after {timeout_secs}s")]
    ShutdownTimeout { timeout_secs: u64 },
}

/// Master error type aggregating every component error.
#[derive(Debug, Clone, Error)]
pub enum PaiError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Result type alias used across every crate in the workspace.
pub type PaiResult<T> = Result<T, PaiError>;
