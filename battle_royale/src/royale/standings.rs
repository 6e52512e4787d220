//! Points leaderboard and per-user stats.

use super::RoyaleResult;
use super::models::RankedPoints;
use crate::db::RoyaleStore;
use crate::identity::UserId;
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of the leaderboard
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardPage {
    pub entries: Vec<RankedPoints>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// A user's standing. Users who never played get zeros and no rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub rank: Option<u64>,
    pub points: i64,
    pub wins: i64,
    pub losses: i64,
    pub tournaments_played: i64,
}

impl UserStats {
    fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            rank: None,
            points: 0,
            wins: 0,
            losses: 0,
            tournaments_played: 0,
        }
    }
}

impl From<RankedPoints> for UserStats {
    fn from(ranked: RankedPoints) -> Self {
        Self {
            user_id: ranked.record.user_id,
            rank: Some(ranked.rank),
            points: ranked.record.points,
            wins: ranked.record.wins,
            losses: ranked.record.losses,
            tournaments_played: ranked.record.tournaments_played,
        }
    }
}

/// Read-only view over accumulated points
#[derive(Clone)]
pub struct Standings {
    store: Arc<dyn RoyaleStore>,
}

impl Standings {
    pub fn new(store: Arc<dyn RoyaleStore>) -> Self {
        Self { store }
    }

    /// Leaderboard page. `limit` defaults to 20 and is clamped to 1..=100.
    pub async fn leaderboard(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> RoyaleResult<LeaderboardPage> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0);
        let (entries, total) = self.store.leaderboard(limit, offset).await?;
        Ok(LeaderboardPage {
            entries,
            total,
            limit,
            offset,
        })
    }

    pub async fn user_stats(&self, user_id: &str) -> RoyaleResult<UserStats> {
        Ok(self
            .store
            .user_points(user_id)
            .await?
            .map(UserStats::from)
            .unwrap_or_else(|| UserStats::empty(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRoyaleStore;

    #[tokio::test]
    async fn test_empty_leaderboard_clamps_limit() {
        let standings = Standings::new(Arc::new(MemoryRoyaleStore::new()));

        let page = standings.leaderboard(Some(500), None).await.unwrap();
        assert_eq!(page.limit, MAX_PAGE_SIZE);
        assert_eq!(page.total, 0);
        assert!(page.entries.is_empty());

        let page = standings.leaderboard(Some(0), Some(5)).await.unwrap();
        assert_eq!(page.limit, 1);
        assert_eq!(page.offset, 5);
    }

    #[tokio::test]
    async fn test_unknown_user_has_zero_stats() {
        let standings = Standings::new(Arc::new(MemoryRoyaleStore::new()));
        let stats = standings.user_stats("ghost").await.unwrap();
        assert_eq!(stats, UserStats::empty("ghost"));
    }
}
