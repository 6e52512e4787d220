//! Short-lived coordination state.
//!
//! Holds per-royale player counters, start locks, used-question lists and
//! match start timestamps. Everything here expires and can be rebuilt from
//! the durable store; it is never authoritative.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use self::memory::MemoryCoordination;
pub use self::redis_store::RedisCoordination;

/// Coordination store errors
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Unexpected value for {key}: {value}")]
    Corrupt { key: String, value: String },
}

pub type CoordinationResult<T> = Result<T, CoordinationError>;

/// Key-value store with expiries and an atomic acquire-if-absent
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Set `key` to `token` only if absent. Returns whether the lock was taken.
    async fn try_lock(&self, key: &str, token: &str, ttl: Duration) -> CoordinationResult<bool>;

    /// Delete `key` only if it still holds `token`
    async fn release_lock(&self, key: &str, token: &str) -> CoordinationResult<bool>;

    async fn get(&self, key: &str) -> CoordinationResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CoordinationResult<()>;

    /// Add `delta` to an integer key (missing counts as 0) and refresh its expiry
    async fn incr(&self, key: &str, delta: i64, ttl: Duration) -> CoordinationResult<i64>;

    async fn delete(&self, key: &str) -> CoordinationResult<()>;

    /// Delete every key starting with `prefix`. Returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> CoordinationResult<usize>;

    async fn ping(&self) -> CoordinationResult<()>;
}

/// Key layout
pub mod keys {
    use uuid::Uuid;

    /// Cached participant count
    pub fn royale_state(royale_id: Uuid) -> String {
        format!("royale:{royale_id}:state")
    }

    /// Start mutual-exclusion token
    pub fn royale_lock(royale_id: Uuid) -> String {
        format!("royale:{royale_id}:lock")
    }

    /// Held for the length of a countdown so only one runs per royale
    pub fn royale_countdown(royale_id: Uuid) -> String {
        format!("royale:{royale_id}:countdown")
    }

    /// JSON array of question ids already used in this royale
    pub fn used_questions(royale_id: Uuid) -> String {
        format!("royale:{royale_id}:used_questions")
    }

    pub fn royale_prefix(royale_id: Uuid) -> String {
        format!("royale:{royale_id}:")
    }

    /// Match start time in unix milliseconds
    pub fn match_started(match_id: Uuid) -> String {
        format!("match:{match_id}:started_at")
    }
}

#[cfg(test)]
mod tests {
    use super::keys;
    use uuid::Uuid;

    #[test]
    fn test_royale_keys_share_prefix() {
        let id = Uuid::new_v4();
        let prefix = keys::royale_prefix(id);
        assert!(keys::royale_state(id).starts_with(&prefix));
        assert!(keys::royale_lock(id).starts_with(&prefix));
        assert!(keys::used_questions(id).starts_with(&prefix));
        assert!(!keys::match_started(id).starts_with(&prefix));
    }
}
