//! PAI LLM - runtime orchestration around the abstract LLM contract
//! (spec.md §2 rows A/C, §6 "LLM contract").
//!
//! Concrete vendor adapters (Anthropic, OpenAI, ...) are explicitly a
//! non-goal (spec.md §1 non-goal (c)): this crate only provides routing,
//! circuit breaking, caching, and cost tracking over whatever `LlmClient` /
//! `EmbeddingProvider` / `SummarizationProvider` implementations the host
//! application registers.

mod cache;
mod circuit_breaker;
mod cost;
mod registry;

pub use cache::EmbeddingCache;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use cost::{PricingTable, TrackedCostTracker};
pub use registry::ProviderRegistry;

pub use pai_core::{
    ChatRequest, ChatResponse, CircuitState, EmbeddingProvider, LlmClient, ProviderCapability,
    RoutingStrategy, SummarizationProvider, SummarizeConfig, SummarizeStyle,
};
