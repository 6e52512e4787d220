//! Engine configuration.
//!
//! Provides the tunables for royale creation, coordination state lifetimes,
//! grading bounds and the stalled-match forfeit policy.

use std::time::Duration;

/// Tournament engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoyaleConfig {
    /// Max players used when the creator does not specify one
    pub default_max_players: u32,

    /// Hard upper bound on max players per royale
    pub max_players_cap: u32,

    /// Points awarded to the tournament winner
    pub winner_points: i64,

    /// Lifetime of per-royale and per-match coordination keys
    pub state_ttl: Duration,

    /// Expiry of the start mutual-exclusion token
    pub start_lock_ttl: Duration,

    /// Delay before coordination keys of a finished royale are dropped
    pub cleanup_delay: Duration,

    /// Countdown ticks before an automatic or admin-triggered start
    pub countdown_secs: u32,

    /// Upper bound on a single grading + complexity evaluation
    pub grading_timeout: Duration,

    /// A match active for longer than this is resolved by forfeit
    pub match_timeout: Duration,
}

impl RoyaleConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - `DEFAULT_MAX_PLAYERS` (default: 10)
    /// - `MAX_PLAYERS_CAP` (default: 10)
    /// - `WINNER_POINTS` (default: 100)
    /// - `ROYALE_STATE_TTL_SECS` (default: 7200)
    /// - `START_LOCK_TTL_SECS` (default: 30)
    /// - `CLEANUP_DELAY_SECS` (default: 30)
    /// - `ROUND_COUNTDOWN_SECONDS` (default: 5)
    /// - `GRADING_TIMEOUT_SECS` (default: 30)
    /// - `MATCH_TIMEOUT_SECONDS` (default: 600)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_max_players: parse_env_or("DEFAULT_MAX_PLAYERS", defaults.default_max_players),
            max_players_cap: parse_env_or("MAX_PLAYERS_CAP", defaults.max_players_cap),
            winner_points: parse_env_or("WINNER_POINTS", defaults.winner_points),
            state_ttl: Duration::from_secs(parse_env_or("ROYALE_STATE_TTL_SECS", 7200)),
            start_lock_ttl: Duration::from_secs(parse_env_or("START_LOCK_TTL_SECS", 30)),
            cleanup_delay: Duration::from_secs(parse_env_or("CLEANUP_DELAY_SECS", 30)),
            countdown_secs: parse_env_or("ROUND_COUNTDOWN_SECONDS", defaults.countdown_secs),
            grading_timeout: Duration::from_secs(parse_env_or("GRADING_TIMEOUT_SECS", 30)),
            match_timeout: Duration::from_secs(parse_env_or("MATCH_TIMEOUT_SECONDS", 600)),
        }
    }

    /// Clamp a requested player cap into `2..=max_players_cap`
    pub fn effective_max_players(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_max_players)
            .min(self.max_players_cap)
            .max(2)
    }
}

impl Default for RoyaleConfig {
    fn default() -> Self {
        Self {
            default_max_players: 10,
            max_players_cap: 10,
            winner_points: 100,
            state_ttl: Duration::from_secs(7200),
            start_lock_ttl: Duration::from_secs(30),
            cleanup_delay: Duration::from_secs(30),
            countdown_secs: 5,
            grading_timeout: Duration::from_secs(30),
            match_timeout: Duration::from_secs(600),
        }
    }
}

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

    #[test]
    fn test_default_config() {
        let config = RoyaleConfig::default();
        assert_eq!(config.default_max_players, 10);
        assert_eq!(config.winner_points, 100);
        assert_eq!(config.state_ttl.as_secs(), 7200);
        assert_eq!(config.start_lock_ttl.as_secs(), 30);
        assert_eq!(config.match_timeout.as_secs(), 600);
    }

    #[test]
    fn test_effective_max_players_is_capped() {
        let config = RoyaleConfig::default();
        assert_eq!(config.effective_max_players(None), 10);
        assert_eq!(config.effective_max_players(Some(4)), 4);
        assert_eq!(config.effective_max_players(Some(64)), 10);
    }
}
