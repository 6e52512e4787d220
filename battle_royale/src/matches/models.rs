//! Match and submission models.

use crate::evaluator::{ComplexityClass, GradeReport, Language};
use crate::identity::{Player, UserId};
use crate::questions::Question;
use crate::royale::models::RoyaleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Match ID type
pub type MatchId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Active,
    Completed,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Active => "active",
            MatchStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(MatchStatus::Pending),
            "active" => Some(MatchStatus::Active),
            "completed" => Some(MatchStatus::Completed),
            _ => None,
        }
    }
}

/// One head-to-head match (or bye) in a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub royale_id: RoyaleId,
    pub round: u32,
    pub match_index: u32,
    pub player1: Option<Player>,
    /// Empty for a bye
    pub player2: Option<Player>,
    /// Frozen at creation; None for byes
    pub question: Option<Question>,
    pub is_final: bool,
    pub status: MatchStatus,
    pub winner: Option<Player>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn is_bye(&self) -> bool {
        self.player1.is_some() && self.player2.is_none()
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    pub fn has_player(&self, user_id: &str) -> bool {
        self.occupants().any(|p| p.user_id == user_id)
    }

    pub fn occupants(&self) -> impl Iterator<Item = &Player> {
        self.player1.iter().chain(self.player2.iter())
    }

    pub fn opponent_of(&self, user_id: &str) -> Option<&Player> {
        match (&self.player1, &self.player2) {
            (Some(p1), Some(p2)) if p1.user_id == user_id => Some(p2),
            (Some(p1), Some(p2)) if p2.user_id == user_id => Some(p1),
            _ => None,
        }
    }
}

/// Insert payload for a match
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub round: u32,
    pub match_index: u32,
    pub player1: Player,
    pub player2: Option<Player>,
    pub question: Option<Question>,
    pub is_final: bool,
}

impl NewMatch {
    /// A bye is created already completed with its sole player as winner
    pub fn bye(round: u32, match_index: u32, player: Player) -> Self {
        Self {
            round,
            match_index,
            player1: player,
            player2: None,
            question: None,
            is_final: false,
        }
    }

    pub fn duel(
        round: u32,
        match_index: u32,
        player1: Player,
        player2: Player,
        question: Question,
        is_final: bool,
    ) -> Self {
        Self {
            round,
            match_index,
            player1,
            player2: Some(player2),
            question: Some(question),
            is_final,
        }
    }

    pub fn is_bye(&self) -> bool {
        self.player2.is_none()
    }

    /// Materialize the match as stored at `now`
    pub fn into_match(self, royale_id: RoyaleId, now: DateTime<Utc>) -> Match {
        let is_bye = self.is_bye();
        Match {
            id: Uuid::new_v4(),
            royale_id,
            round: self.round,
            match_index: self.match_index,
            winner: is_bye.then(|| self.player1.clone()),
            player1: Some(self.player1),
            player2: self.player2,
            question: self.question,
            is_final: self.is_final,
            status: if is_bye {
                MatchStatus::Completed
            } else {
                MatchStatus::Active
            },
            started_at: (!is_bye).then_some(now),
            completed_at: is_bye.then_some(now),
        }
    }
}

/// A recorded, immutable submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub match_id: MatchId,
    pub user_id: UserId,
    pub username: String,
    pub code: String,
    pub language: Language,
    pub passed: bool,
    pub output: String,
    pub passed_count: u32,
    pub total_count: u32,
    pub elapsed_ms: i64,
    pub complexity: ComplexityClass,
    pub submitted_at: DateTime<Utc>,
    /// Store-assigned insertion order; breaks submitted_at ties
    pub sequence: i64,
}

impl Submission {
    pub fn player(&self) -> Player {
        Player::new(self.user_id.clone(), self.username.clone())
    }
}

/// Insert payload for a submission
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub match_id: MatchId,
    pub player: Player,
    pub code: String,
    pub language: Language,
    pub report: GradeReport,
    pub elapsed_ms: i64,
    pub complexity: ComplexityClass,
}

/// What the submitter gets back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub match_id: MatchId,
    pub passed: bool,
    pub output: String,
    pub passed_count: u32,
    pub total_count: u32,
    pub elapsed_ms: i64,
    pub complexity: String,
    /// This submission completed the match
    pub decided: bool,
    pub winner: Option<Player>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bye_is_completed_with_winner() {
        let now = Utc::now();
        let m = NewMatch::bye(1, 0, Player::new("u1", "alice")).into_match(Uuid::new_v4(), now);

        assert!(m.is_bye());
        assert_eq!(m.status, MatchStatus::Completed);
        assert_eq!(m.winner.as_ref().map(|p| p.user_id.as_str()), Some("u1"));
        assert_eq!(m.completed_at, Some(now));
        assert_eq!(m.started_at, None);
    }

    #[test]
    fn test_opponent_lookup() {
        let question = Question {
            id: "q".into(),
            title: "Q".into(),
            description: String::new(),
            test_cases: Vec::new(),
        };
        let m = NewMatch::duel(
            1,
            0,
            Player::new("u1", "alice"),
            Player::new("u2", "bob"),
            question,
            false,
        )
        .into_match(Uuid::new_v4(), Utc::now());

        assert_eq!(m.status, MatchStatus::Active);
        assert!(m.winner.is_none());
        assert!(m.started_at.is_some());
        assert_eq!(m.opponent_of("u1").unwrap().user_id, "u2");
        assert_eq!(m.opponent_of("u2").unwrap().user_id, "u1");
        assert!(m.opponent_of("u3").is_none());
        assert!(m.has_player("u2"));
        assert!(!m.has_player("u3"));
    }
}
