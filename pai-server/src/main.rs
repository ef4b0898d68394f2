//! PAI Server Entry Point
//!
//! Bootstraps logging, loads configuration, and starts the `/healthz` +
//! `/metrics` Axum server. Storage and bus handles default to the
//! in-memory implementations; point `pai-server` at real backends by
//! swapping the construction in `build_state` for your deployment's
//! `KeyValueStore`/`VectorStore`/`Bus` implementations.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use pai_core::{compute_content_hash, EmbeddingProvider, EmbeddingVector, PaiResult};
use pai_events::InMemoryBus;
use pai_server::telemetry::LoggingConfig;
use pai_server::{create_router, load_pai_config, init_logging, ApiResult, AppState, ServerConfig};
use pai_storage::{MemoryKeyValueStore, MemoryVectorStore};

/// Deterministic content-hash embedder used for the in-memory default
/// wiring. Real deployments inject a model-backed `EmbeddingProvider` from
/// `pai-llm` instead.
struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> PaiResult<EmbeddingVector> {
        let hash = compute_content_hash(text.as_bytes());
        let data: Vec<f32> = hash.iter().take(8).map(|b| *b as f32).collect();
        Ok(EmbeddingVector::new(data, "hash-embedder"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> PaiResult<Vec<EmbeddingVector>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> i32 {
        8
    }

    fn model_id(&self) -> &str {
        "hash-embedder"
    }
}

fn build_state() -> AppState {
    AppState::new(
        Arc::new(InMemoryBus::new()),
        Arc::new(MemoryKeyValueStore::new()),
        Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder))),
    )
}

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_logging(&LoggingConfig::default())?;

    let pai_config = load_pai_config()?;
    tracing::info!(
        max_tool_iterations = pai_config.agent.max_tool_iterations,
        cold_archive_root = %pai_config.cold_archive_root,
        "loaded PaiConfig"
    );

    let server_config = ServerConfig::from_env();
    let state = build_state();
    let app = create_router(state, &server_config);

    let addr: SocketAddr = format!("{}:{}", server_config.bind_host, server_config.bind_port)
        .parse()
        .expect("bind_host/bind_port must form a valid socket address");

    tracing::info!(%addr, "starting pai-server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
