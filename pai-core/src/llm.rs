//! LLM-related primitive types and traits (spec.md §2 row A "LLM Client",
//! §6 "LLM contract").
//!
//! Pure data types and interface definitions. Runtime orchestration
//! (ProviderRegistry, CircuitBreaker, CostTracker, provider adapters) lives
//! in pai-llm.

use crate::{ConversationMessage, EmbeddingVector, ModelTier, PaiResult, ToolSchema, Usage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// SUMMARIZATION TYPES
// ============================================================================

/// Style of summarization output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SummarizeStyle {
    /// Brief, high-level summary
    Brief,
    /// Detailed, comprehensive summary
    Detailed,
    /// Structured summary with sections
    Structured,
    /// Extractive fallback: list user requests, enumerate tool names (spec.md §4.3).
    Extractive,
}

impl SummarizeStyle {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Brief => "Brief",
            Self::Detailed => "Detailed",
            Self::Structured => "Structured",
            Self::Extractive => "Extractive",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, SummarizeStyleParseError> {
        match s {
            "Brief" => Ok(Self::Brief),
            "Detailed" => Ok(Self::Detailed),
            "Structured" => Ok(Self::Structured),
            "Extractive" => Ok(Self::Extractive),
            _ => Err(SummarizeStyleParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizeStyleParseError(pub String);

impl std::fmt::Display for SummarizeStyleParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid summarize style: {}", self.0)
    }
}

impl std::error::Error for SummarizeStyleParseError {}

/// Configuration for a summarization request (spec.md §4.3: 200-400 word
/// summary of all but the last K=12 messages).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizeConfig {
    pub min_words: i32,
    pub max_words: i32,
    pub style: SummarizeStyle,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            min_words: 200,
            max_words: 400,
            style: SummarizeStyle::Brief,
        }
    }
}

// ============================================================================
// PROVIDER CAPABILITY
// ============================================================================

/// Capabilities a provider can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderCapability {
    /// Generate chat completions with optional tool use.
    Chat,
    /// Generate embeddings
    Embedding,
    /// Generate summaries
    Summarization,
}

impl ProviderCapability {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::Embedding => "Embedding",
            Self::Summarization => "Summarization",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, ProviderCapabilityParseError> {
        match s {
            "Chat" => Ok(Self::Chat),
            "Embedding" => Ok(Self::Embedding),
            "Summarization" => Ok(Self::Summarization),
            _ => Err(ProviderCapabilityParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCapabilityParseError(pub String);

impl std::fmt::Display for ProviderCapabilityParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid provider capability: {}", self.0)
    }
}

impl std::error::Error for ProviderCapabilityParseError {}

// ============================================================================
// CIRCUIT STATE
// ============================================================================

/// Circuit breaker state (spec.md §7 "LLM provider unavailable").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(v: u8) -> Self {
        match v {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }
}

impl CircuitState {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Closed => "Closed",
            Self::Open => "Open",
            Self::HalfOpen => "HalfOpen",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, CircuitStateParseError> {
        match s {
            "Closed" => Ok(Self::Closed),
            "Open" => Ok(Self::Open),
            "HalfOpen" => Ok(Self::HalfOpen),
            _ => Err(CircuitStateParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitStateParseError(pub String);

impl std::fmt::Display for CircuitStateParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid circuit state: {}", self.0)
    }
}

impl std::error::Error for CircuitStateParseError {}

// ============================================================================
// ROUTING STRATEGY
// ============================================================================

/// Strategy for routing chat requests to a model tier (spec.md §3 "ModelTier").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RoutingStrategy {
    #[default]
    RoundRobin,
    LeastLatency,
    Random,
    /// Route by required capability.
    Capability(ProviderCapability),
    /// Always use the first healthy provider.
    First,
}

impl RoutingStrategy {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "RoundRobin",
            Self::LeastLatency => "LeastLatency",
            Self::Random => "Random",
            Self::Capability(_) => "Capability",
            Self::First => "First",
        }
    }
}

// ============================================================================
// CHAT REQUEST / RESPONSE
// ============================================================================

/// A single chat completion request (spec.md §6 "LLM contract":
/// `create_message(model_tier, messages, tools?, system?) -> (content_blocks, stop_reason, usage)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model_tier: ModelTier,
    pub messages: Vec<ConversationMessage>,
    pub tools: Option<Vec<ToolSchema>>,
    pub system: Option<String>,
    pub max_tokens: Option<i32>,
}

/// Reply to a chat completion request, including accounting for cost tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ConversationMessage,
    pub stop_reason: crate::StopReason,
    pub usage: Usage,
}

// ============================================================================
// PROVIDER TRAITS
// ============================================================================

/// Interface for a chat/tool-use capable LLM provider. Implementations
/// (Anthropic, OpenAI, Ollama, ...) and runtime orchestration
/// (ProviderRegistry, CircuitBreaker) live in pai-llm.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Issue a chat completion request against a specific model tier.
    async fn create_message(&self, request: ChatRequest) -> PaiResult<ChatResponse>;

    /// Provider identifier, e.g. "anthropic", "openai".
    fn provider_id(&self) -> &str;
}

/// Interface for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> PaiResult<EmbeddingVector>;

    async fn embed_batch(&self, texts: &[&str]) -> PaiResult<Vec<EmbeddingVector>>;

    fn dimensions(&self) -> i32;

    fn model_id(&self) -> &str;
}

/// Interface for summarization providers (spec.md §4.3 summarization trigger).
#[async_trait]
pub trait SummarizationProvider: Send + Sync {
    async fn summarize(&self, content: &str, config: &SummarizeConfig) -> PaiResult<String>;
}

// ============================================================================
// TOKENIZER TRAIT
// ============================================================================

/// Trait for counting tokens in text, used for context-window budgeting.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> i32;

    fn model_family(&self) -> &str;

    /// Encode text to token IDs. Returns empty vec if not supported.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode token IDs back to text. Returns empty string if not supported.
    fn decode(&self, tokens: &[u32]) -> String;
}

/// Heuristic tokenizer using character-to-token ratios. spec.md §4.3 mandates
/// "a conservative 4-chars-per-token rule" for the context manager; that is
/// the `unknown`/default family here (ratio 0.25 == 1/4).
#[derive(Debug, Clone)]
pub struct HeuristicTokenizer {
    ratio: f32,
    model_family: String,
}

impl HeuristicTokenizer {
    pub fn for_model(model: &str) -> Self {
        let (ratio, family) = if model.contains("gpt-4") || model.contains("gpt-3.5") {
            (0.25, "gpt")
        } else if model.contains("claude") {
            (0.28, "claude")
        } else if model.contains("text-embedding") {
            (0.25, "openai-embedding")
        } else if model.contains("llama") || model.contains("mistral") {
            (0.27, "open-source")
        } else {
            (0.25, "unknown")
        };

        Self {
            ratio,
            model_family: family.to_string(),
        }
    }

    pub fn with_ratio(ratio: f32, model_family: impl Into<String>) -> Self {
        Self {
            ratio,
            model_family: model_family.into(),
        }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }
}

impl Default for HeuristicTokenizer {
    fn default() -> Self {
        Self::for_model("unknown")
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, text: &str) -> i32 {
        (text.len() as f32 * self.ratio).ceil() as i32
    }

    fn model_family(&self) -> &str {
        &self.model_family
    }

    fn encode(&self, _text: &str) -> Vec<u32> {
        Vec::new()
    }

    fn decode(&self, _tokens: &[u32]) -> String {
        String::new()
    }
}

/// Estimate tokens using the spec's default 4-chars-per-token rule.
pub fn estimate_tokens(text: &str) -> i32 {
    HeuristicTokenizer::default().count(text)
}
