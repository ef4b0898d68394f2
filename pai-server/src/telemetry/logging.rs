//! Structured logging initialization (spec.md §4.14 ambient stack).
//!
//! Sets up a `tracing-subscriber` registry with an env-filter and JSON
//! formatting, matching the density of logging the rest of the workspace's
//! crates already emit via `tracing` spans per task/tool-call.

use pai_core::{ConfigError, PaiError, PaiResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration sourced from the environment.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Service name attached to every log line.
    pub service_name: String,
    /// `RUST_LOG`-style filter string; falls back to a sane per-crate default.
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("PAI_SERVICE_NAME").unwrap_or_else(|_| "pai-server".to_string()),
            filter: std::env::var("RUST_LOG").ok(),
        }
    }
}

/// Initialize the global `tracing` subscriber. Must be called once at
/// process startup before any other `tracing` call.
pub fn init_logging(config: &LoggingConfig) -> PaiResult<()> {
    let env_filter = match &config.filter {
        Some(filter) => EnvFilter::try_new(filter).map_err(|e| {
            PaiError::Config(ConfigError::InvalidValue {
                field: "RUST_LOG".to_string(),
                value: filter.clone(),
                reason: e.to_string(),
            })
        })?,
        None => EnvFilter::new("pai_server=debug,pai_agents=debug,pai_memory=debug,info"),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| {
            PaiError::Config(ConfigError::InvalidValue {
                field: "tracing_subscriber".to_string(),
                value: "init".to_string(),
                reason: e.to_string(),
            })
        })?;

    tracing::info!(service_name = %config.service_name, "logging initialized");
    Ok(())
}
