//! Ambient configuration for the agent execution core and memory pipeline.
//!
//! Every numeric ceiling named in spec.md §4.3 and §6 ("Iteration cap and
//! token accounting (defaults)") is a configuration field with the spec's
//! default, not a hardcoded literal, so operators can tune it without a
//! rebuild.

use crate::{ConfigError, PaiError, PaiResult};
use serde::{Deserialize, Serialize};

/// Token-budget and truncation knobs for the context manager (spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub max_context_tokens: i32,
    pub safe_context_tokens: i32,
    pub summarize_trigger_tokens: i32,
    pub summarize_trigger_messages: usize,
    pub retained_recent_messages: usize,
    pub hard_history_cap_messages: usize,
    pub max_tool_result_chars: usize,
    pub max_image_data_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 200_000,
            safe_context_tokens: 180_000,
            summarize_trigger_tokens: 100_000,
            summarize_trigger_messages: 24,
            retained_recent_messages: 12,
            hard_history_cap_messages: 32,
            max_tool_result_chars: 40_000,
            max_image_data_chars: 100_000,
        }
    }
}

/// Iteration caps and timeouts for the agent runtime (spec.md §4.4, §5, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRuntimeConfig {
    pub max_tool_iterations: u32,
    pub subagent_iteration_cap: u32,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_ttl_secs: u64,
    pub graceful_shutdown_timeout_secs: u64,
    pub chat_history_preload_messages: usize,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: 50,
            subagent_iteration_cap: 15,
            heartbeat_interval_secs: 15,
            heartbeat_ttl_secs: 60,
            graceful_shutdown_timeout_secs: 30,
            chat_history_preload_messages: 20,
        }
    }
}

/// Warm/cold tier retention and quality-gate knobs (spec.md §4.7, §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub hot_tier_ttl_secs: u64,
    pub min_content_length: usize,
    pub min_confidence: f32,
    pub min_alpha_ratio: f32,
    pub dedup_score_threshold: f32,
    pub dedup_search_limit: usize,
    pub default_boost_amount: f32,
    pub default_decay_amount: f32,
    pub archive_older_than_days: i64,
    pub archive_high_confidence_days: i64,
    pub archive_high_confidence_threshold: f32,
    pub archive_batch_size: usize,
    pub cold_cleanup_older_than_days: i64,
    pub phase_cache_ttl_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            hot_tier_ttl_secs: 24 * 3600,
            min_content_length: 20,
            min_confidence: 0.40,
            min_alpha_ratio: 0.40,
            dedup_score_threshold: 0.92,
            dedup_search_limit: 3,
            default_boost_amount: 0.1,
            default_decay_amount: 0.05,
            archive_older_than_days: 30,
            archive_high_confidence_days: 60,
            archive_high_confidence_threshold: 0.9,
            archive_batch_size: 100,
            cold_cleanup_older_than_days: 365,
            phase_cache_ttl_secs: 300,
        }
    }
}

/// Root configuration, composed of the per-component sections above plus
/// the filesystem root for the cold archive (spec.md §4.8, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaiConfig {
    pub context: ContextConfig,
    pub agent: AgentRuntimeConfig,
    pub memory: MemoryConfig,
    pub cold_archive_root: String,
}

impl Default for PaiConfig {
    fn default() -> Self {
        Self {
            context: ContextConfig::default(),
            agent: AgentRuntimeConfig::default(),
            memory: MemoryConfig::default(),
            cold_archive_root: "./data/learning".to_string(),
        }
    }
}

impl PaiConfig {
    /// Load configuration, overlaying environment variables on the defaults.
    ///
    /// Recognized variables: `PAI_MAX_TOOL_ITERATIONS`, `PAI_HEARTBEAT_INTERVAL_SECS`,
    /// `PAI_COLD_ARCHIVE_ROOT`. Anything unset falls back to the spec default.
    pub fn load() -> PaiResult<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("PAI_MAX_TOOL_ITERATIONS") {
            config.agent.max_tool_iterations = raw.parse().map_err(|_| {
                PaiError::Config(ConfigError::InvalidValue {
                    field: "PAI_MAX_TOOL_ITERATIONS".to_string(),
                    value: raw.clone(),
                    reason: "must be a positive integer".to_string(),
                })
            })?;
        }

        if let Ok(raw) = std::env::var("PAI_HEARTBEAT_INTERVAL_SECS") {
            config.agent.heartbeat_interval_secs = raw.parse().map_err(|_| {
                PaiError::Config(ConfigError::InvalidValue {
                    field: "PAI_HEARTBEAT_INTERVAL_SECS".to_string(),
                    value: raw.clone(),
                    reason: "must be a positive integer".to_string(),
                })
            })?;
        }

        if let Ok(raw) = std::env::var("PAI_COLD_ARCHIVE_ROOT") {
            config.cold_archive_root = raw;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PaiResult<()> {
        if self.context.safe_context_tokens > self.context.max_context_tokens {
            return Err(PaiError::Config(ConfigError::InvalidValue {
                field: "context.safe_context_tokens".to_string(),
                value: self.context.safe_context_tokens.to_string(),
                reason: "must not exceed max_context_tokens".to_string(),
            }));
        }
        if self.agent.subagent_iteration_cap > self.agent.max_tool_iterations {
            return Err(PaiError::Config(ConfigError::InvalidValue {
                field: "agent.subagent_iteration_cap".to_string(),
                value: self.agent.subagent_iteration_cap.to_string(),
                reason: "must not exceed max_tool_iterations".to_string(),
            }));
        }
        if !(0.0..=1.0).contains(&self.memory.min_confidence) {
            return Err(PaiError::Config(ConfigError::InvalidValue {
                field: "memory.min_confidence".to_string(),
                value: self.memory.min_confidence.to_string(),
                reason: "must be in [0.0, 1.0]".to_string(),
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = PaiConfig::default();
        assert_eq!(config.context.max_context_tokens, 200_000);
        assert_eq!(config.context.safe_context_tokens, 180_000);
        assert_eq!(config.context.summarize_trigger_tokens, 100_000);
        assert_eq!(config.context.max_tool_result_chars, 40_000);
        assert_eq!(config.context.max_image_data_chars, 100_000);
        assert_eq!(config.agent.max_tool_iterations, 50);
        assert_eq!(config.agent.subagent_iteration_cap, 15);
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(PaiConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_token_budgets() {
        let mut config = PaiConfig::default();
        config.context.safe_context_tokens = config.context.max_context_tokens + 1;
        assert!(config.validate().is_err());
    }
}
