//! Live WebSocket sessions, one per user and royale.

use battle_royale::identity::UserId;
use battle_royale::royale::RoyaleId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

type SessionKey = (RoyaleId, UserId);

/// Registry of open sessions
#[derive(Clone, Default)]
pub struct SessionRegistry {
    open: Arc<Mutex<HashSet<SessionKey>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<SessionKey>> {
        // The set stays consistent even if a holder panicked
        self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the session slot of `user_id` in `royale_id`.
    ///
    /// Returns `None` while another session holds it. The slot is freed when
    /// the returned guard is dropped.
    pub fn claim(&self, royale_id: RoyaleId, user_id: &str) -> Option<SessionGuard> {
        let key = (royale_id, user_id.to_string());
        if !self.lock().insert(key.clone()) {
            return None;
        }
        Some(SessionGuard {
            registry: self.clone(),
            key,
        })
    }

    pub fn is_open(&self, royale_id: RoyaleId, user_id: &str) -> bool {
        self.lock().contains(&(royale_id, user_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds a session slot until dropped
pub struct SessionGuard {
    registry: SessionRegistry,
    key: SessionKey,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}
