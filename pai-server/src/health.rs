//! Health endpoint (spec.md §6 "External interfaces", ambient, mirrors the
//! teacher's `routes/health.rs`): `GET /healthz` reports per-component
//! readiness for the bus, vector store, and key-value store a deployed
//! agent runtime depends on.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use pai_core::health::{self, HealthCheck, HealthStatus};
use pai_core::PaiError;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub uptime_seconds: u64,
    pub checks: Vec<HealthCheck>,
}

async fn check_bus(state: &AppState) -> HealthCheck {
    let start = Instant::now();
    match state.bus.publish("pai.healthz", serde_json::json!({"probe": true})).await {
        Ok(()) => HealthCheck::healthy("bus").with_response_time(start.elapsed().as_millis() as i64),
        Err(PaiError::Bus(pai_core::BusError::NoSubscribers { .. })) => {
            // Reached the broker; simply nobody is listening on this topic.
            HealthCheck::healthy("bus").with_response_time(start.elapsed().as_millis() as i64)
        }
        Err(e) => HealthCheck::unhealthy("bus", e.to_string()),
    }
}

async fn check_kv(state: &AppState) -> HealthCheck {
    let start = Instant::now();
    match state.kv.set("__pai_healthz__", "1", Some(5)).await {
        Ok(()) => HealthCheck::healthy("kv_store").with_response_time(start.elapsed().as_millis() as i64),
        Err(e) => HealthCheck::unhealthy("kv_store", e.to_string()),
    }
}

async fn check_vector_store(state: &AppState) -> HealthCheck {
    let start = Instant::now();
    match state.vectors.scroll(None, 1, None).await {
        Ok(_) => {
            HealthCheck::healthy("vector_store").with_response_time(start.elapsed().as_millis() as i64)
        }
        Err(e) => HealthCheck::unhealthy("vector_store", e.to_string()),
    }
}

/// `GET /healthz`: aggregate readiness of every storage/bus dependency.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let checks = vec![
        check_bus(&state).await,
        check_kv(&state).await,
        check_vector_store(&state).await,
    ];

    let status = health::aggregate(&checks);

    let report = HealthReport {
        status: status.clone(),
        uptime_seconds: state.uptime_secs(),
        checks,
    };

    let code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy | HealthStatus::Unknown => StatusCode::SERVICE_UNAVAILABLE,
    };

    (code, Json(report))
}
