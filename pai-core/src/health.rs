//! Unified health check types
//!
//! This module provides unified health check types that can be used across
//! different crates (API, LLM, etc.) for consistent health reporting.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Health status for a service or component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Component is fully operational
    Healthy,
    /// Component is operational but degraded
    Degraded,
    /// Component is not operational
    Unhealthy,
    /// Health status is unknown (e.g., not yet checked)
    Unknown,
}

/// Detailed health check result for a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall health status
    pub status: HealthStatus,
    /// Component name
    pub component: String,
    /// Detailed status message
    pub message: Option<String>,
    /// Response time in milliseconds (if applicable)
    pub response_time_ms: Option<i64>,
    /// Additional metadata
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl HealthCheck {
    /// Create a healthy check result.
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            component: component.into(),
            message: None,
            response_time_ms: None,
            metadata: None,
        }
    }

    /// Create a degraded check result.
    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            component: component.into(),
            message: Some(message.into()),
            response_time_ms: None,
            metadata: None,
        }
    }

    /// Create an unhealthy check result.
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            component: component.into(),
            message: Some(message.into()),
            response_time_ms: None,
            metadata: None,
        }
    }

    /// Set the response time.
    pub fn with_response_time(mut self, ms: i64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    /// Add metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

/// Rolls a set of component checks up into one overall status (spec.md §6
/// "aggregate readiness"): unhealthy if any component is unhealthy, degraded
/// if any is degraded (and none unhealthy), healthy otherwise. An empty set
/// of checks is `Unknown` rather than vacuously healthy.
pub fn aggregate(checks: &[HealthCheck]) -> HealthStatus {
    if checks.is_empty() {
        HealthStatus::Unknown
    } else if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_is_unknown_with_no_checks() {
        assert_eq!(aggregate(&[]), HealthStatus::Unknown);
    }

    #[test]
    fn aggregate_prefers_unhealthy_over_degraded() {
        let checks = vec![HealthCheck::degraded("bus", "slow"), HealthCheck::unhealthy("kv", "down")];
        assert_eq!(aggregate(&checks), HealthStatus::Unhealthy);
    }

    #[test]
    fn aggregate_is_healthy_when_every_check_is_healthy() {
        let checks = vec![HealthCheck::healthy("bus"), HealthCheck::healthy("kv")];
        assert_eq!(aggregate(&checks), HealthStatus::Healthy);
    }
}
