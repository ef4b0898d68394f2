//! Provider registry: selects among registered `LlmClient`/`EmbeddingProvider`
//! /`SummarizationProvider` implementations by routing strategy and circuit
//! breaker health (spec.md §6 "LLM contract").

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use pai_core::health::HealthCheck;
use pai_core::{EmbeddingProvider, EmbeddingVector, LlmClient, PaiError, PaiResult};
use pai_core::{ChatRequest, ChatResponse, LlmError, RoutingStrategy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

struct Registered<T: ?Sized> {
    provider: Arc<T>,
    breaker: Arc<CircuitBreaker>,
}

/// Routes chat requests across registered `LlmClient`s, and separately
/// tracks `EmbeddingProvider`s, applying a shared routing strategy and
/// per-provider circuit breaking.
pub struct ProviderRegistry {
    routing_strategy: RoutingStrategy,
    llm_clients: RwLock<HashMap<String, Registered<dyn LlmClient>>>,
    embedding_providers: RwLock<HashMap<String, Registered<dyn EmbeddingProvider>>>,
    round_robin_index: AtomicU64,
}

impl ProviderRegistry {
    pub fn new(routing_strategy: RoutingStrategy) -> Self {
        Self {
            routing_strategy,
            llm_clients: RwLock::new(HashMap::new()),
            embedding_providers: RwLock::new(HashMap::new()),
            round_robin_index: AtomicU64::new(0),
        }
    }

    pub fn with_round_robin() -> Self {
        Self::new(RoutingStrategy::RoundRobin)
    }

    pub async fn register_llm(&self, client: Arc<dyn LlmClient>) {
        let id = client.provider_id().to_string();
        self.llm_clients.write().await.insert(
            id,
            Registered {
                provider: client,
                breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
            },
        );
    }

    pub async fn register_embedding(&self, provider: Arc<dyn EmbeddingProvider>) {
        let id = provider.model_id().to_string();
        self.embedding_providers.write().await.insert(
            id,
            Registered {
                provider,
                breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
            },
        );
    }

    pub async fn has_llm_clients(&self) -> bool {
        !self.llm_clients.read().await.is_empty()
    }

    /// One `HealthCheck` per registered LLM provider, reflecting its circuit
    /// breaker's state (SPEC_FULL.md provider-health section). Consumed by a
    /// deployment's `/healthz` aggregation alongside storage/bus checks.
    pub async fn health_checks(&self) -> Vec<HealthCheck> {
        self.llm_clients
            .read()
            .await
            .iter()
            .map(|(id, registered)| registered.breaker.health_check(id.clone()))
            .collect()
    }

    fn select<'a, T: ?Sized>(
        &self,
        available: &'a [(&'a String, &'a Registered<T>)],
    ) -> Option<&'a Arc<T>> {
        if available.is_empty() {
            return None;
        }
        match &self.routing_strategy {
            RoutingStrategy::First | RoutingStrategy::Capability(_) => {
                available.first().map(|(_, r)| &r.provider)
            }
            RoutingStrategy::RoundRobin => {
                let idx = self.round_robin_index.fetch_add(1, Ordering::Relaxed) as usize
                    % available.len();
                available.get(idx).map(|(_, r)| &r.provider)
            }
            RoutingStrategy::Random | RoutingStrategy::LeastLatency => {
                // Without a live latency sample, fall back to the first
                // healthy provider; a real deployment feeds latency samples
                // back into the routing decision via `record_latency`.
                available.first().map(|(_, r)| &r.provider)
            }
        }
    }

    /// Issue a chat completion through a healthy, routed `LlmClient`.
    pub async fn create_message(&self, request: ChatRequest) -> PaiResult<ChatResponse> {
        let clients = self.llm_clients.read().await;
        let available: Vec<_> = clients
            .iter()
            .filter(|(_, r)| r.breaker.is_allowed())
            .collect();

        let client = self
            .select(&available)
            .cloned()
            .ok_or(PaiError::Llm(LlmError::ProviderNotConfigured))?;
        drop(clients);

        let result = client.create_message(request).await;
        self.record_llm_outcome(client.provider_id(), result.is_ok()).await;
        result
    }

    async fn record_llm_outcome(&self, provider_id: &str, success: bool) {
        if let Some(registered) = self.llm_clients.read().await.get(provider_id) {
            if success {
                registered.breaker.record_success();
            } else {
                registered.breaker.record_failure();
            }
        }
    }

    /// Generate an embedding through a healthy, routed `EmbeddingProvider`.
    pub async fn embed(&self, text: &str) -> PaiResult<EmbeddingVector> {
        let providers = self.embedding_providers.read().await;
        let available: Vec<_> = providers
            .iter()
            .filter(|(_, r)| r.breaker.is_allowed())
            .collect();

        let provider = self
            .select(&available)
            .cloned()
            .ok_or(PaiError::Llm(LlmError::ProviderNotConfigured))?;
        drop(providers);

        let result = provider.embed(text).await;
        if let Some(registered) = self.embedding_providers.read().await.get(provider.model_id()) {
            match &result {
                Ok(_) => registered.breaker.record_success(),
                Err(_) => registered.breaker.record_failure(),
            }
        }
        result
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("routing_strategy", &self.routing_strategy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pai_core::{ConversationMessage, ModelTier, StopReason, Usage};

    struct AlwaysFailClient;

    #[async_trait]
    impl LlmClient for AlwaysFailClient {
        async fn create_message(&self, _request: ChatRequest) -> PaiResult<ChatResponse> {
            Err(PaiError::Llm(LlmError::RequestFailed {
                provider: "flaky".to_string(),
                status: 500,
                message: "boom".to_string(),
            }))
        }

        fn provider_id(&self) -> &str {
            "flaky"
        }
    }

    struct EchoClient;

    #[async_trait]
    impl LlmClient for EchoClient {
        async fn create_message(&self, _request: ChatRequest) -> PaiResult<ChatResponse> {
            Ok(ChatResponse {
                message: ConversationMessage::assistant(vec![pai_core::ContentBlock::text("ok")]),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            })
        }

        fn provider_id(&self) -> &str {
            "echo"
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model_tier: ModelTier::Fast,
            messages: vec![ConversationMessage::user("hi")],
            tools: None,
            system: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn empty_registry_has_no_clients() {
        let registry = ProviderRegistry::with_round_robin();
        assert!(!registry.has_llm_clients().await);
    }

    #[tokio::test]
    async fn routes_to_registered_client() {
        let registry = ProviderRegistry::with_round_robin();
        registry.register_llm(Arc::new(EchoClient)).await;
        let response = registry.create_message(request()).await.unwrap();
        assert_eq!(response.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn circuit_opens_after_repeated_failures() {
        let registry = ProviderRegistry::with_round_robin();
        registry.register_llm(Arc::new(AlwaysFailClient)).await;
        for _ in 0..5 {
            let _ = registry.create_message(request()).await;
        }
        let err = registry.create_message(request()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn health_checks_report_a_tripped_breaker_unhealthy() {
        let registry = ProviderRegistry::with_round_robin();
        registry.register_llm(Arc::new(AlwaysFailClient)).await;
        for _ in 0..5 {
            let _ = registry.create_message(request()).await;
        }

        let checks = registry.health_checks().await;
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].status, pai_core::health::HealthStatus::Unhealthy);
        assert_eq!(checks[0].component, "flaky");
    }
}
