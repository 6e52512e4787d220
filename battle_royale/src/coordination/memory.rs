//! In-process coordination store for tests and single-node runs.

use super::{CoordinationError, CoordinationResult, CoordinationStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Default)]
pub struct MemoryCoordination {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCoordination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired keys
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CoordinationStore for MemoryCoordination {
    async fn try_lock(&self, key: &str, token: &str, ttl: Duration) -> CoordinationResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: token.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release_lock(&self, key: &str, token: &str) -> CoordinationResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let owned = entries
            .get(key)
            .is_some_and(|e| e.is_live(now) && e.value == token);
        if owned {
            entries.remove(key);
        }
        Ok(owned)
    }

    async fn get(&self, key: &str) -> CoordinationResult<Option<String>> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CoordinationResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str, delta: i64, ttl: Duration) -> CoordinationResult<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let current = match entries.get(key).filter(|e| e.is_live(now)) {
            Some(entry) => entry
                .value
                .parse::<i64>()
                .map_err(|_| CoordinationError::Corrupt {
                    key: key.to_string(),
                    value: entry.value.clone(),
                })?,
            None => 0,
        };
        let next = current + delta;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(next)
    }

    async fn delete(&self, key: &str) -> CoordinationResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> CoordinationResult<usize> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }

    async fn ping(&self) -> CoordinationResult<()> {
        Ok(())
    }
}
