//! Router assembly for the `pai-server` ambient surface: `/healthz` and
//! `/metrics` only (spec.md §1 non-goal: no UI, auth, or chat transport).

use crate::config::ServerConfig;
use crate::health::healthz;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};
use axum::{middleware, routing::get, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = if config.cors_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(observability_middleware))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pai_events::InMemoryBus;
    use pai_storage::{MemoryKeyValueStore, MemoryVectorStore};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct OneDimEmbedder;

    #[async_trait::async_trait]
    impl pai_core::EmbeddingProvider for OneDimEmbedder {
        async fn embed(&self, _text: &str) -> pai_core::PaiResult<pai_core::EmbeddingVector> {
            Ok(pai_core::EmbeddingVector::new(vec![0.0], "test".to_string()))
        }
        async fn embed_batch(
            &self,
            texts: &[&str],
        ) -> pai_core::PaiResult<Vec<pai_core::EmbeddingVector>> {
            let mut out = Vec::new();
            for _ in texts {
                out.push(self.embed("").await?);
            }
            Ok(out)
        }
        fn dimensions(&self) -> i32 {
            1
        }
        fn model_id(&self) -> &str {
            "test"
        }
    }

    fn test_router() -> Router {
        let state = AppState::new(
            Arc::new(InMemoryBus::new()),
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(MemoryVectorStore::new(Arc::new(OneDimEmbedder))),
        );
        create_router(state, &ServerConfig::default())
    }

    #[tokio::test]
    async fn healthz_route_is_served() {
        let response = test_router()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_route_is_served() {
        let response = test_router()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
