//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use battle_royale::config::RoyaleConfig;
use battle_royale::db::DatabaseConfig;
use battle_royale::evaluator::RunnerConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Default bind address
const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 5000);

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis URL for coordination state; in-process when unset
    pub redis_url: Option<String>,
    /// Security configuration
    pub security: SecurityConfig,
    /// Tournament engine tunables
    pub royale: RoyaleConfig,
    /// Local code runner settings
    pub runner: RunnerConfig,
    /// Interval between stalled-match sweeps
    pub sweep_interval: Duration,
    /// Prometheus exporter address; metrics disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Run without PostgreSQL or Redis
    pub in_memory: bool,
}

/// Security-related configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// JWT verification secret (required)
    pub jwt_secret: String,
}

/// Command line overrides
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub in_memory: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if `JWT_SECRET` is missing or too short
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        let bind = overrides
            .bind
            .or_else(|| {
                std::env::var("SERVER_BIND")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or_else(|| SocketAddr::from(DEFAULT_BIND));

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = overrides.database_url {
            database.database_url = url;
        }

        let redis_url = overrides
            .redis_url
            .or_else(|| std::env::var("REDIS_URL").ok())
            .filter(|url| !url.trim().is_empty());

        // Security configuration (REQUIRED)
        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Generate with: openssl rand -hex 32".to_string(),
        })?;

        let metrics_bind = std::env::var("METRICS_BIND")
            .ok()
            .and_then(|s| s.parse().ok());

        Ok(ServerConfig {
            bind,
            database,
            redis_url,
            security: SecurityConfig { jwt_secret },
            royale: RoyaleConfig::from_env(),
            runner: RunnerConfig::from_env(),
            sweep_interval: Duration::from_secs(parse_env_or("SWEEP_INTERVAL_SECS", 15)),
            metrics_bind,
            in_memory: overrides.in_memory || parse_env_or("IN_MEMORY", false),
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if self.royale.max_players_cap < 2 {
            return Err(ConfigError::Invalid {
                var: "MAX_PLAYERS_CAP".to_string(),
                reason: "Must be at least 2".to_string(),
            });
        }

        if self.royale.default_max_players < 2 {
            return Err(ConfigError::Invalid {
                var: "DEFAULT_MAX_PLAYERS".to_string(),
                reason: "Must be at least 2".to_string(),
            });
        }

        if self.royale.winner_points <= 0 {
            return Err(ConfigError::Invalid {
                var: "WINNER_POINTS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.royale.grading_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "GRADING_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.royale.match_timeout <= self.royale.grading_timeout {
            return Err(ConfigError::Invalid {
                var: "MATCH_TIMEOUT_SECONDS".to_string(),
                reason: format!(
                    "Must exceed the grading timeout ({}s)",
                    self.royale.grading_timeout.as_secs()
                ),
            });
        }

        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "SWEEP_INTERVAL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            bind: SocketAddr::from(DEFAULT_BIND),
            database: DatabaseConfig::development(),
            redis_url: None,
            security: SecurityConfig {
                jwt_secret: "a".repeat(32),
            },
            royale: RoyaleConfig::default(),
            runner: RunnerConfig::default(),
            sweep_interval: Duration::from_secs(15),
            metrics_bind: None,
            in_memory: true,
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Use openssl".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("JWT_SECRET"));
        assert!(msg.contains("Use openssl"));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let mut config = valid_config();
        config.security.jwt_secret = "short".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "JWT_SECRET"));
    }

    #[test]
    fn test_match_timeout_must_exceed_grading() {
        let mut config = valid_config();
        config.royale.match_timeout = config.royale.grading_timeout;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "MATCH_TIMEOUT_SECONDS"));
    }

    #[test]
    fn test_player_cap_must_allow_a_duel() {
        let mut config = valid_config();
        config.royale.max_players_cap = 1;
        assert!(config.validate().is_err());
    }
}
