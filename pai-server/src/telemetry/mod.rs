//! PAI Telemetry - Observability Infrastructure
//!
//! Structured logging and Prometheus metrics for the optional `pai-server`
//! ambient surface (spec.md §4.14).

pub mod logging;
pub mod metrics;
pub mod middleware;

pub use logging::{init_logging, LoggingConfig};
pub use metrics::{metrics_handler, PaiMetrics, METRICS};
pub use middleware::observability_middleware;
