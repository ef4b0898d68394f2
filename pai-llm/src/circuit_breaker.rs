//! Circuit breaker for provider health management (spec.md §7 "LLM provider
//! unavailable").

use pai_core::health::{HealthCheck, HealthStatus};
use pai_core::CircuitState;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Per-provider circuit breaker: opens after `failure_threshold` consecutive
/// failures, half-opens after `timeout`, closes after `success_threshold`
/// consecutive successes while half-open.
pub struct CircuitBreaker {
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    last_failure: RwLock<Option<Instant>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_failure: RwLock::new(None),
            config,
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn is_allowed(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if let Ok(guard) = self.last_failure.read() {
                    if let Some(last) = *guard {
                        if last.elapsed() > self.config.timeout {
                            self.state.store(CircuitState::HalfOpen as u8, Ordering::SeqCst);
                            return true;
                        }
                    }
                }
                false
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);

        if self.state() == CircuitState::HalfOpen {
            let count = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
            if count >= self.config.success_threshold {
                self.state.store(CircuitState::Closed as u8, Ordering::SeqCst);
                self.success_count.store(0, Ordering::SeqCst);
            }
        }
    }

    pub fn record_failure(&self) {
        self.success_count.store(0, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_failure.write() {
            *guard = Some(Instant::now());
        }
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.config.failure_threshold {
            self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
        }
    }

    pub fn reset(&self) {
        self.state.store(CircuitState::Closed as u8, Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_failure.write() {
            *guard = None;
        }
    }

    /// Reports this breaker's state through `pai_core::health::HealthCheck`
    /// (SPEC_FULL.md provider-health section) so `pai-server`'s `/healthz`
    /// can surface a degraded or tripped provider the same way it reports
    /// storage/bus readiness: `Closed` is healthy, `HalfOpen` is degraded
    /// (probing, not yet trusted), `Open` is unhealthy.
    pub fn health_check(&self, provider: impl Into<String>) -> HealthCheck {
        let provider = provider.into();
        let failure_count = self.failure_count.load(Ordering::Relaxed);
        let check = match self.state() {
            CircuitState::Closed => HealthCheck::healthy(provider),
            CircuitState::HalfOpen => {
                HealthCheck::degraded(provider, "circuit half-open, probing for recovery")
            }
            CircuitState::Open => HealthCheck::unhealthy(provider, format!("circuit open after {failure_count} consecutive failures")),
        };
        check.with_metadata("failure_count", serde_json::json!(failure_count))
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("failure_count", &self.failure_count.load(Ordering::Relaxed))
            .field("success_count", &self.success_count.load(Ordering::Relaxed))
            .finish()
    }
}
