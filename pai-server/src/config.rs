//! Server Configuration Module
//!
//! Configuration for the optional `pai-server` ambient surface: where it
//! binds, CORS, and config-file discovery for the shared `PaiConfig`
//! (spec.md §6 "External interfaces"). Environment variables layer on top
//! of file and hardcoded defaults, matching `pai_core::PaiConfig::load`.

use pai_core::{ConfigError, PaiConfig, PaiError, PaiResult};
use std::path::PathBuf;
use std::time::Duration;

/// HTTP-layer configuration: bind address, CORS, and rate limiting.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_host: String,
    pub bind_port: u16,

    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,
    pub cors_allow_credentials: bool,
    pub cors_max_age_secs: u64,

    pub rate_limit_enabled: bool,
    pub rate_limit_unauthenticated: u32,
    pub rate_limit_burst: u32,
    pub rate_limit_window: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 8080,

            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,

            rate_limit_enabled: true,
            rate_limit_unauthenticated: 100,
            rate_limit_burst: 10,
            rate_limit_window: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Create `ServerConfig` from environment variables.
    ///
    /// Recognized variables: `PAI_SERVER_BIND_HOST`, `PAI_SERVER_BIND_PORT`,
    /// `PAI_SERVER_CORS_ORIGINS`, `PAI_SERVER_CORS_ALLOW_CREDENTIALS`,
    /// `PAI_SERVER_CORS_MAX_AGE_SECS`, `PAI_SERVER_RATE_LIMIT_ENABLED`,
    /// `PAI_SERVER_RATE_LIMIT_UNAUTHENTICATED`, `PAI_SERVER_RATE_LIMIT_BURST`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_host =
            std::env::var("PAI_SERVER_BIND_HOST").unwrap_or(defaults.bind_host);
        let bind_port = std::env::var("PAI_SERVER_BIND_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.bind_port);

        let cors_origins = std::env::var("PAI_SERVER_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("PAI_SERVER_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("PAI_SERVER_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(86400);

        let rate_limit_enabled = std::env::var("PAI_SERVER_RATE_LIMIT_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let rate_limit_unauthenticated = std::env::var("PAI_SERVER_RATE_LIMIT_UNAUTHENTICATED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        let rate_limit_burst = std::env::var("PAI_SERVER_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Self {
            bind_host,
            bind_port,
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            rate_limit_enabled,
            rate_limit_unauthenticated,
            rate_limit_burst,
            rate_limit_window: Duration::from_secs(60),
        }
    }

    /// Check if running with a locked-down CORS allowlist.
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(pattern)
                        || origin_domain == pattern.strip_prefix('.').unwrap_or(pattern);
                }
            }
            false
        })
    }
}

/// Locate the `PaiConfig` TOML file per spec.md §6: `PAI_CONFIG_PATH` env
/// var, else `./pai.toml` if it exists, else no file (use hardcoded
/// defaults).
fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PAI_CONFIG_PATH") {
        return Some(PathBuf::from(path));
    }
    let default_path = PathBuf::from("./pai.toml");
    default_path.exists().then_some(default_path)
}

/// Load the shared `PaiConfig`, overlaying an optional TOML file found via
/// [`discover_config_path`] under the hardcoded defaults, then applying the
/// same environment overlay as `PaiConfig::load`.
pub fn load_pai_config() -> PaiResult<PaiConfig> {
    let mut config = match discover_config_path() {
        Some(path) => {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                PaiError::Config(ConfigError::InvalidValue {
                    field: "PAI_CONFIG_PATH".to_string(),
                    value: path.display().to_string(),
                    reason: format!("could not read config file: {e}"),
                })
            })?;
            toml::from_str(&raw).map_err(|e| {
                PaiError::Config(ConfigError::InvalidValue {
                    field: "PAI_CONFIG_PATH".to_string(),
                    value: path.display().to_string(),
                    reason: format!("invalid TOML: {e}"),
                })
            })?
        }
        None => PaiConfig::default(),
    };

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.cors_origins.is_empty());
        assert!(!config.cors_allow_credentials);
        assert_eq!(config.cors_max_age_secs, 86400);
        assert!(config.rate_limit_enabled);
        assert_eq!(config.rate_limit_unauthenticated, 100);
        assert_eq!(config.rate_limit_burst, 10);
    }

    #[test]
    fn test_is_production() {
        let mut config = ServerConfig::default();
        assert!(!config.is_production());

        config.cors_origins = vec!["https://pai.run".to_string()];
        assert!(config.is_production());
    }

    #[test]
    fn test_origin_allowed_dev_mode() {
        let config = ServerConfig::default();
        assert!(config.is_origin_allowed("https://anything.com"));
        assert!(config.is_origin_allowed("http://localhost:3000"));
    }

    #[test]
    fn test_origin_allowed_production() {
        let mut config = ServerConfig::default();
        config.cors_origins = vec![
            "https://pai.run".to_string(),
            "https://app.pai.run".to_string(),
        ];

        assert!(config.is_origin_allowed("https://pai.run"));
        assert!(config.is_origin_allowed("https://app.pai.run"));
        assert!(!config.is_origin_allowed("https://evil.com"));
        assert!(!config.is_origin_allowed("https://notpai.run"));
    }

    #[test]
    fn test_wildcard_subdomain() {
        let mut config = ServerConfig::default();
        config.cors_origins = vec!["*.pai.run".to_string()];

        assert!(config.is_origin_allowed("https://app.pai.run"));
        assert!(config.is_origin_allowed("https://api.pai.run"));
        assert!(!config.is_origin_allowed("https://evil.com"));
    }

    #[test]
    fn test_load_pai_config_without_file_uses_defaults() {
        std::env::remove_var("PAI_CONFIG_PATH");
        std::env::remove_var("PAI_MAX_TOOL_ITERATIONS");
        let config = load_pai_config().expect("default config must validate");
        assert_eq!(config.agent.max_tool_iterations, 50);
    }
}
