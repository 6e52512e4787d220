//! Royale data models.

use crate::identity::{Player, Role, UserId};
use crate::matches::Match;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Royale ID type
pub type RoyaleId = Uuid;

/// Question difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    /// Parse a stored tier; unknown values read as Easy
    pub fn parse(value: &str) -> Self {
        match value {
            "Medium" => Difficulty::Medium,
            "Hard" => Difficulty::Hard,
            _ => Difficulty::Easy,
        }
    }
}

/// Royale visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "public" => Visibility::Public,
            _ => Visibility::Private,
        }
    }
}

/// Royale lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoyaleStatus {
    Waiting,
    InProgress,
    Completed,
    Cancelled,
}

impl RoyaleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RoyaleStatus::Waiting => "waiting",
            RoyaleStatus::InProgress => "in_progress",
            RoyaleStatus::Completed => "completed",
            RoyaleStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(RoyaleStatus::Waiting),
            "in_progress" => Some(RoyaleStatus::InProgress),
            "completed" => Some(RoyaleStatus::Completed),
            "cancelled" => Some(RoyaleStatus::Cancelled),
            _ => None,
        }
    }
}

/// A battle royale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Royale {
    pub id: RoyaleId,
    pub code: String,
    pub title: String,
    pub creator: Player,
    pub creator_role: Role,
    pub difficulty: Difficulty,
    pub visibility: Visibility,
    pub status: RoyaleStatus,
    pub max_players: u32,
    pub current_round: u32,
    pub total_rounds: u32,
    pub winner: Option<Player>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new royale
#[derive(Debug, Clone)]
pub struct NewRoyale {
    pub code: String,
    pub title: String,
    pub creator: Player,
    pub creator_role: Role,
    pub difficulty: Difficulty,
    pub visibility: Visibility,
    pub max_players: u32,
}

/// Creation request as sent by a client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRoyaleRequest {
    pub title: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default, alias = "maxPlayers")]
    pub max_players: Option<u32>,
    #[serde(default, alias = "royaleType")]
    pub visibility: Option<Visibility>,
}

/// Royale participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub royale_id: RoyaleId,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub is_connected: bool,
    /// Round in which the participant lost; None while still in contention
    pub eliminated_in_round: Option<u32>,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn player(&self) -> Player {
        Player::new(self.user_id.clone(), self.username.clone())
    }
}

/// Result of a successful join
#[derive(Debug, Clone, Serialize)]
pub struct JoinOutcome {
    pub royale: Royale,
    pub player_count: u32,
    pub is_full: bool,
}

/// Royale with its participants and matches
#[derive(Debug, Clone, Serialize)]
pub struct RoyaleDetails {
    pub royale: Royale,
    pub participants: Vec<Participant>,
    pub matches: Vec<Match>,
}

/// Aggregate points of one user across tournaments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsRecord {
    pub user_id: UserId,
    pub username: String,
    pub points: i64,
    pub wins: i64,
    pub losses: i64,
    pub tournaments_played: i64,
    pub updated_at: DateTime<Utc>,
}

/// Points record with its 1-based leaderboard position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedPoints {
    pub rank: u64,
    #[serde(flatten)]
    pub record: PointsRecord,
}

/// Points settled for one participant at tournament completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsAward {
    pub user_id: UserId,
    pub username: String,
    pub points: i64,
    pub won: bool,
}
