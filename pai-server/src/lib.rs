//! PAI Server - Optional Ambient HTTP Surface
//!
//! Exposes a `/healthz` readiness endpoint and a Prometheus `/metrics`
//! endpoint for a deployed PAI workspace (spec.md §6 "External
//! interfaces"). This crate does not transport chat traffic, host an agent
//! runtime, or carry any auth/UI/account-storage surface (spec.md §1
//! non-goals) - those concerns live in the agent that embeds `pai-agents`
//! directly and publishes to the shared bus.

pub mod config;
pub mod error;
pub mod health;
pub mod router;
pub mod state;
pub mod telemetry;

pub use config::{load_pai_config, ServerConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use health::{healthz, HealthReport};
pub use router::create_router;
pub use state::AppState;
pub use telemetry::{init_logging, metrics_handler, LoggingConfig, PaiMetrics, METRICS};
