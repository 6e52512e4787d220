//! In-memory `RoyaleStore` for tests and database-less runs.
//!
//! Every operation runs under one write lock, which gives the conditional
//! transitions the same exactly-once behaviour as the PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::RoyaleStore;
use crate::identity::{Identity, Player};
use crate::matches::{Match, MatchId, MatchStatus, NewMatch, NewSubmission, Submission};
use crate::royale::models::{
    NewRoyale, Participant, PointsAward, PointsRecord, RankedPoints, Royale, RoyaleId,
    RoyaleStatus,
};
use crate::royale::{RoyaleError, RoyaleResult};

#[derive(Debug, Default)]
struct State {
    royales: HashMap<RoyaleId, Royale>,
    participants: HashMap<RoyaleId, Vec<Participant>>,
    matches: HashMap<MatchId, Match>,
    submissions: HashMap<MatchId, Vec<Submission>>,
    points: HashMap<String, PointsRecord>,
    next_sequence: i64,
}

impl State {
    fn royale_mut(&mut self, royale_id: RoyaleId) -> RoyaleResult<&mut Royale> {
        self.royales
            .get_mut(&royale_id)
            .ok_or(RoyaleError::RoyaleNotFound(royale_id))
    }

    fn sorted_matches(&self, filter: impl Fn(&Match) -> bool) -> Vec<Match> {
        let mut matches: Vec<Match> = self
            .matches
            .values()
            .filter(|m| filter(m))
            .cloned()
            .collect();
        matches.sort_by_key(|m| (m.round, m.match_index));
        matches
    }

    fn insert_matches(&mut self, royale_id: RoyaleId, new_matches: Vec<NewMatch>) -> Vec<Match> {
        let now = Utc::now();
        new_matches
            .into_iter()
            .map(|new_match| {
                let m = new_match.into_match(royale_id, now);
                self.matches.insert(m.id, m.clone());
                m
            })
            .collect()
    }

    fn ranked(&self) -> Vec<PointsRecord> {
        let mut records: Vec<PointsRecord> = self.points.values().cloned().collect();
        records.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then(b.wins.cmp(&a.wins))
                .then(a.user_id.cmp(&b.user_id))
        });
        records
    }
}

#[derive(Debug, Default)]
pub struct MemoryRoyaleStore {
    state: RwLock<State>,
}

impl MemoryRoyaleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoyaleStore for MemoryRoyaleStore {
    async fn insert_royale(&self, royale: NewRoyale) -> RoyaleResult<Royale> {
        let mut state = self.state.write().await;
        if state.royales.values().any(|r| r.code == royale.code) {
            return Err(RoyaleError::DuplicateCode);
        }

        let created = Royale {
            id: Uuid::new_v4(),
            code: royale.code,
            title: royale.title,
            creator: royale.creator,
            creator_role: royale.creator_role,
            difficulty: royale.difficulty,
            visibility: royale.visibility,
            status: RoyaleStatus::Waiting,
            max_players: royale.max_players,
            current_round: 0,
            total_rounds: 0,
            winner: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        state.royales.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_royale(&self, royale_id: RoyaleId) -> RoyaleResult<Option<Royale>> {
        Ok(self.state.read().await.royales.get(&royale_id).cloned())
    }

    async fn find_royale_by_code(&self, code: &str) -> RoyaleResult<Option<Royale>> {
        let state = self.state.read().await;
        Ok(state.royales.values().find(|r| r.code == code).cloned())
    }

    async fn add_participant(
        &self,
        royale_id: RoyaleId,
        identity: &Identity,
    ) -> RoyaleResult<u32> {
        let mut state = self.state.write().await;
        let royale = state.royale_mut(royale_id)?;
        if royale.status != RoyaleStatus::Waiting {
            return Err(RoyaleError::InvalidState {
                expected: RoyaleStatus::Waiting,
                actual: royale.status,
            });
        }
        let max_players = royale.max_players;

        let participants = state.participants.entry(royale_id).or_default();
        if participants.iter().any(|p| p.user_id == identity.user_id) {
            return Err(RoyaleError::AlreadyJoined);
        }
        if participants.len() as u32 >= max_players {
            return Err(RoyaleError::RoomFull);
        }

        participants.push(Participant {
            royale_id,
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            role: identity.role,
            is_connected: true,
            eliminated_in_round: None,
            joined_at: Utc::now(),
        });
        Ok(participants.len() as u32)
    }

    async fn remove_participant(&self, royale_id: RoyaleId, user_id: &str) -> RoyaleResult<u32> {
        let mut state = self.state.write().await;
        let royale = state.royale_mut(royale_id)?;
        if royale.status != RoyaleStatus::Waiting {
            return Err(RoyaleError::InvalidState {
                expected: RoyaleStatus::Waiting,
                actual: royale.status,
            });
        }

        let participants = state.participants.entry(royale_id).or_default();
        let before = participants.len();
        participants.retain(|p| p.user_id != user_id);
        if participants.len() == before {
            return Err(RoyaleError::NotJoined);
        }
        Ok(participants.len() as u32)
    }

    async fn participants(&self, royale_id: RoyaleId) -> RoyaleResult<Vec<Participant>> {
        let state = self.state.read().await;
        Ok(state
            .participants
            .get(&royale_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_connected(
        &self,
        royale_id: RoyaleId,
        user_id: &str,
        connected: bool,
    ) -> RoyaleResult<bool> {
        let mut state = self.state.write().await;
        let participant = state
            .participants
            .get_mut(&royale_id)
            .and_then(|ps| ps.iter_mut().find(|p| p.user_id == user_id));

        Ok(match participant {
            Some(p) => {
                p.is_connected = connected;
                true
            }
            None => false,
        })
    }

    async fn start_royale(
        &self,
        royale_id: RoyaleId,
        total_rounds: u32,
        matches: Vec<NewMatch>,
    ) -> RoyaleResult<Option<Vec<Match>>> {
        let mut state = self.state.write().await;
        let royale = state.royale_mut(royale_id)?;
        if royale.status != RoyaleStatus::Waiting {
            return Ok(None);
        }

        royale.status = RoyaleStatus::InProgress;
        royale.current_round = 1;
        royale.total_rounds = total_rounds;
        royale.started_at = Some(Utc::now());

        Ok(Some(state.insert_matches(royale_id, matches)))
    }

    async fn find_match(&self, match_id: MatchId) -> RoyaleResult<Option<Match>> {
        Ok(self.state.read().await.matches.get(&match_id).cloned())
    }

    async fn matches(&self, royale_id: RoyaleId) -> RoyaleResult<Vec<Match>> {
        let state = self.state.read().await;
        Ok(state.sorted_matches(|m| m.royale_id == royale_id))
    }

    async fn round_matches(&self, royale_id: RoyaleId, round: u32) -> RoyaleResult<Vec<Match>> {
        let state = self.state.read().await;
        Ok(state.sorted_matches(|m| m.royale_id == royale_id && m.round == round))
    }

    async fn expired_matches(&self, started_before: DateTime<Utc>) -> RoyaleResult<Vec<Match>> {
        let state = self.state.read().await;
        Ok(state.sorted_matches(|m| {
            m.status == MatchStatus::Active && m.started_at.is_some_and(|t| t < started_before)
        }))
    }

    async fn royales_in_progress(&self) -> RoyaleResult<Vec<Royale>> {
        let state = self.state.read().await;
        Ok(state
            .royales
            .values()
            .filter(|r| r.status == RoyaleStatus::InProgress)
            .cloned()
            .collect())
    }

    async fn insert_submission(&self, submission: NewSubmission) -> RoyaleResult<Submission> {
        let mut state = self.state.write().await;
        let status = state
            .matches
            .get(&submission.match_id)
            .map(|m| m.status)
            .ok_or(RoyaleError::MatchNotFound(submission.match_id))?;
        if status != MatchStatus::Active {
            return Err(RoyaleError::MatchNotActive);
        }

        let existing = state.submissions.entry(submission.match_id).or_default();
        if existing
            .iter()
            .any(|s| s.user_id == submission.player.user_id)
        {
            return Err(RoyaleError::AlreadySubmitted);
        }

        state.next_sequence += 1;
        let recorded = Submission {
            id: Uuid::new_v4(),
            match_id: submission.match_id,
            user_id: submission.player.user_id,
            username: submission.player.username,
            code: submission.code,
            language: submission.language,
            passed: submission.report.passed,
            output: submission.report.output,
            passed_count: submission.report.passed_count,
            total_count: submission.report.total_count,
            elapsed_ms: submission.elapsed_ms,
            complexity: submission.complexity,
            submitted_at: Utc::now(),
            sequence: state.next_sequence,
        };
        state
            .submissions
            .entry(recorded.match_id)
            .or_default()
            .push(recorded.clone());
        Ok(recorded)
    }

    async fn submissions(&self, match_id: MatchId) -> RoyaleResult<Vec<Submission>> {
        let state = self.state.read().await;
        Ok(state.submissions.get(&match_id).cloned().unwrap_or_default())
    }

    async fn has_submitted(&self, match_id: MatchId, user_id: &str) -> RoyaleResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .submissions
            .get(&match_id)
            .is_some_and(|subs| subs.iter().any(|s| s.user_id == user_id)))
    }

    async fn complete_match(&self, match_id: MatchId, winner: &Player) -> RoyaleResult<bool> {
        let mut state = self.state.write().await;
        let Some(m) = state.matches.get_mut(&match_id) else {
            return Ok(false);
        };
        if m.status != MatchStatus::Active {
            return Ok(false);
        }

        m.status = MatchStatus::Completed;
        m.winner = Some(winner.clone());
        m.completed_at = Some(Utc::now());

        let royale_id = m.royale_id;
        let round = m.round;
        let loser = m
            .occupants()
            .find(|p| p.user_id != winner.user_id)
            .map(|p| p.user_id.clone());

        if let Some(loser) = loser {
            if let Some(p) = state
                .participants
                .get_mut(&royale_id)
                .and_then(|ps| ps.iter_mut().find(|p| p.user_id == loser))
            {
                p.eliminated_in_round.get_or_insert(round);
            }
        }
        Ok(true)
    }

    async fn advance_round(
        &self,
        royale_id: RoyaleId,
        from_round: u32,
        matches: Vec<NewMatch>,
    ) -> RoyaleResult<Option<Vec<Match>>> {
        let mut state = self.state.write().await;
        let royale = state.royale_mut(royale_id)?;
        if royale.status != RoyaleStatus::InProgress || royale.current_round != from_round {
            return Ok(None);
        }

        royale.current_round = from_round + 1;
        Ok(Some(state.insert_matches(royale_id, matches)))
    }

    async fn complete_royale(
        &self,
        royale_id: RoyaleId,
        winner: &Player,
        winner_points: i64,
    ) -> RoyaleResult<Option<Vec<PointsAward>>> {
        let mut state = self.state.write().await;
        let royale = state.royale_mut(royale_id)?;
        if royale.status != RoyaleStatus::InProgress {
            return Ok(None);
        }

        let now = Utc::now();
        royale.status = RoyaleStatus::Completed;
        royale.winner = Some(winner.clone());
        royale.completed_at = Some(now);
        let final_round = royale.current_round;

        let participants = state.participants.entry(royale_id).or_default();
        for p in participants.iter_mut() {
            if p.user_id != winner.user_id && p.eliminated_in_round.is_none() {
                p.eliminated_in_round = Some(final_round);
            }
        }

        let awards: Vec<PointsAward> = participants
            .iter()
            .map(|p| {
                let won = p.user_id == winner.user_id;
                PointsAward {
                    user_id: p.user_id.clone(),
                    username: p.username.clone(),
                    points: if won { winner_points } else { 0 },
                    won,
                }
            })
            .collect();

        for award in &awards {
            let record = state
                .points
                .entry(award.user_id.clone())
                .or_insert_with(|| PointsRecord {
                    user_id: award.user_id.clone(),
                    username: award.username.clone(),
                    points: 0,
                    wins: 0,
                    losses: 0,
                    tournaments_played: 0,
                    updated_at: now,
                });
            record.username = award.username.clone();
            record.points += award.points;
            record.wins += i64::from(award.won);
            record.losses += i64::from(!award.won);
            record.tournaments_played += 1;
            record.updated_at = now;
        }

        Ok(Some(awards))
    }

    async fn leaderboard(
        &self,
        limit: u32,
        offset: u32,
    ) -> RoyaleResult<(Vec<RankedPoints>, u64)> {
        let state = self.state.read().await;
        let ranked = state.ranked();
        let total = ranked.len() as u64;

        let entries = ranked
            .into_iter()
            .enumerate()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(i, record)| RankedPoints {
                rank: i as u64 + 1,
                record,
            })
            .collect();

        Ok((entries, total))
    }

    async fn user_points(&self, user_id: &str) -> RoyaleResult<Option<RankedPoints>> {
        let state = self.state.read().await;
        let Some(record) = state.points.get(user_id).cloned() else {
            return Ok(None);
        };
        let ahead = state
            .points
            .values()
            .filter(|r| r.points > record.points)
            .count();

        Ok(Some(RankedPoints {
            rank: ahead as u64 + 1,
            record,
        }))
    }

    async fn health_check(&self) -> RoyaleResult<()> {
        Ok(())
    }
}
