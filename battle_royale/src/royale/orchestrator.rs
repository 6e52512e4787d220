//! Tournament orchestration: creation, joining, starting, round advancement
//! and completion.

use super::models::{
    CreateRoyaleRequest, JoinOutcome, PointsAward, Royale, RoyaleDetails, RoyaleId, RoyaleStatus,
    Visibility,
};
use super::{RoyaleError, RoyaleResult};
use crate::bracket::{Bracket, build_bracket};
use crate::codes::{generate_code, normalize_code};
use crate::context::RoyaleContext;
use crate::coordination::keys;
use crate::events::{MatchSummary, RoyaleEvent};
use crate::identity::{Identity, Player, Role};
use crate::matches::{Match, NewMatch};
use crate::questions::{Question, pick_question};
use crate::royale::models::NewRoyale;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Attempts at finding an unused join code before giving up
const MAX_CODE_ATTEMPTS: usize = 10;

/// Minimum participants needed to start
pub const MIN_PLAYERS: usize = 2;

/// Longest accepted royale title
const MAX_TITLE_LEN: usize = 200;

/// What a round-completion check did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The round still has unfinished matches
    Pending,
    /// Nothing to do: the royale is not in progress or already moved past the round
    Unchanged,
    /// Matches for `round` were created
    Advanced { round: u32 },
    /// The tournament finished with this champion
    Completed { winner: Player },
}

/// Pair slots into matches, freezing a question into every real duel
fn plan_matches(
    round: u32,
    slots: Vec<(Player, Option<Player>)>,
    is_final: bool,
    pool: &[Question],
    used: &mut HashSet<String>,
) -> RoyaleResult<Vec<NewMatch>> {
    let mut rng = rand::rng();
    let mut planned = Vec::with_capacity(slots.len());

    for (index, (player1, player2)) in slots.into_iter().enumerate() {
        let index = index as u32;
        match player2 {
            None => planned.push(NewMatch::bye(round, index, player1)),
            Some(player2) => {
                let question = pick_question(pool, used, &mut rng).ok_or_else(|| {
                    RoyaleError::Validation("No questions available for this difficulty".into())
                })?;
                used.insert(question.id.clone());
                planned.push(NewMatch::duel(
                    round, index, player1, player2, question, is_final,
                ));
            }
        }
    }

    Ok(planned)
}

/// Pair winners in order; an odd player out gets a bye
fn pair_sequentially(players: Vec<Player>) -> Vec<(Player, Option<Player>)> {
    let mut slots = Vec::with_capacity(players.len().div_ceil(2));
    let mut players = players.into_iter();
    while let Some(first) = players.next() {
        slots.push((first, players.next()));
    }
    slots
}

fn summarize(matches: &[Match]) -> Vec<MatchSummary> {
    matches
        .iter()
        .map(|m| MatchSummary {
            match_id: m.id,
            match_index: m.match_index,
            player1: m.player1.clone(),
            player2: m.player2.clone(),
            is_bye: m.is_bye(),
            is_final: m.is_final,
        })
        .collect()
}

/// Tournament orchestrator
#[derive(Clone)]
pub struct RoyaleManager {
    ctx: RoyaleContext,
}

impl RoyaleManager {
    pub fn new(ctx: RoyaleContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RoyaleContext {
        &self.ctx
    }

    /// Load a royale or fail with `RoyaleNotFound`
    pub async fn find_royale(&self, royale_id: RoyaleId) -> RoyaleResult<Royale> {
        self.ctx
            .store
            .find_royale(royale_id)
            .await?
            .ok_or(RoyaleError::RoyaleNotFound(royale_id))
    }

    /// Create a royale in `waiting` state.
    ///
    /// Only admins and teachers may create; only admins pick the visibility.
    pub async fn create_royale(
        &self,
        creator: &Identity,
        request: CreateRoyaleRequest,
    ) -> RoyaleResult<Royale> {
        if !creator.role.is_privileged() {
            return Err(RoyaleError::Forbidden(
                "Only admins and teachers can create royales".to_string(),
            ));
        }

        let title = request.title.trim();
        if title.is_empty() {
            return Err(RoyaleError::Validation("Title is required".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(RoyaleError::Validation(format!(
                "Title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        if request.max_players.is_some_and(|n| (n as usize) < MIN_PLAYERS) {
            return Err(RoyaleError::Validation(format!(
                "A royale needs room for at least {MIN_PLAYERS} players"
            )));
        }

        let visibility = match creator.role {
            Role::Admin => request.visibility.unwrap_or_default(),
            _ => Visibility::Private,
        };

        let mut royale = None;
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let new_royale = NewRoyale {
                code: generate_code(),
                title: title.to_string(),
                creator: creator.player(),
                creator_role: creator.role,
                difficulty: request.difficulty.unwrap_or_default(),
                visibility,
                max_players: self.ctx.config.effective_max_players(request.max_players),
            };

            match self.ctx.store.insert_royale(new_royale).await {
                Ok(created) => {
                    royale = Some(created);
                    break;
                }
                Err(RoyaleError::DuplicateCode) => {
                    debug!("Join code clash on attempt {}, retrying", attempt);
                }
                Err(e) => return Err(e),
            }
        }
        let royale = royale.ok_or(RoyaleError::DuplicateCode)?;

        if let Err(e) = self
            .ctx
            .coordination
            .set(&keys::royale_state(royale.id), "0", self.ctx.config.state_ttl)
            .await
        {
            warn!("Failed to seed player counter for royale {}: {}", royale.id, e);
        }

        info!(
            "Royale {} ({}) created by {} with code {}",
            royale.id, royale.title, creator.username, royale.code
        );
        Ok(royale)
    }

    /// Join a waiting royale by code
    pub async fn join_royale(&self, code: &str, identity: &Identity) -> RoyaleResult<JoinOutcome> {
        let code = normalize_code(code);
        let royale = self
            .ctx
            .store
            .find_royale_by_code(&code)
            .await?
            .ok_or(RoyaleError::InvalidCode(code))?;

        let player_count = self.ctx.store.add_participant(royale.id, identity).await?;
        self.adjust_player_counter(royale.id, 1).await;

        self.ctx.events.to_royale(
            royale.id,
            RoyaleEvent::PlayerJoined {
                player: identity.player(),
                player_count,
                max_players: royale.max_players,
            },
        );

        info!(
            "{} joined royale {} ({}/{})",
            identity.username, royale.id, player_count, royale.max_players
        );

        let is_full = player_count >= royale.max_players;
        Ok(JoinOutcome {
            royale,
            player_count,
            is_full,
        })
    }

    /// Leave a royale that has not started yet
    pub async fn leave_royale(&self, royale_id: RoyaleId, identity: &Identity) -> RoyaleResult<u32> {
        let player_count = self
            .ctx
            .store
            .remove_participant(royale_id, &identity.user_id)
            .await?;
        self.adjust_player_counter(royale_id, -1).await;

        self.ctx.events.to_royale(
            royale_id,
            RoyaleEvent::PlayerLeft {
                player: identity.player(),
                player_count,
                kicked: false,
                disconnected: false,
            },
        );

        info!("{} left royale {}", identity.username, royale_id);
        Ok(player_count)
    }

    /// Remove another participant from a waiting royale
    pub async fn kick_participant(
        &self,
        royale_id: RoyaleId,
        actor: &Identity,
        user_id: &str,
    ) -> RoyaleResult<u32> {
        let royale = self.find_royale(royale_id).await?;
        Self::authorize_manage(&royale, actor)?;

        let participant = self
            .ctx
            .store
            .participants(royale_id)
            .await?
            .into_iter()
            .find(|p| p.user_id == user_id)
            .ok_or(RoyaleError::NotJoined)?;

        let player_count = self.ctx.store.remove_participant(royale_id, user_id).await?;
        self.adjust_player_counter(royale_id, -1).await;

        self.ctx.events.to_royale(
            royale_id,
            RoyaleEvent::PlayerLeft {
                player: participant.player(),
                player_count,
                kicked: true,
                disconnected: false,
            },
        );

        info!(
            "{} kicked {} from royale {}",
            actor.username, participant.username, royale_id
        );
        Ok(player_count)
    }

    /// Admins may manage any royale, teachers only their own
    fn authorize_manage(royale: &Royale, actor: &Identity) -> RoyaleResult<()> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::Teacher if royale.creator.user_id == actor.user_id => Ok(()),
            Role::Teacher => Err(RoyaleError::Forbidden(
                "Teachers can only manage royales they created".to_string(),
            )),
            Role::Student => Err(RoyaleError::Forbidden(
                "Only admins and teachers can manage royales".to_string(),
            )),
        }
    }

    async fn adjust_player_counter(&self, royale_id: RoyaleId, delta: i64) {
        if let Err(e) = self
            .ctx
            .coordination
            .incr(&keys::royale_state(royale_id), delta, self.ctx.config.state_ttl)
            .await
        {
            warn!("Failed to update player counter for royale {}: {}", royale_id, e);
        }
    }

    /// Start a royale on behalf of a privileged actor
    pub async fn start_tournament(
        &self,
        royale_id: RoyaleId,
        actor: &Identity,
    ) -> RoyaleResult<Bracket> {
        let royale = self.find_royale(royale_id).await?;
        Self::authorize_manage(&royale, actor)?;
        self.start_locked(royale_id).await
    }

    /// Publish a countdown, then start. With no actor the start is a
    /// capacity-triggered auto-start and skips the role check.
    ///
    /// Player count and the countdown token are checked before anything is
    /// spawned, so a rejected caller gets its error directly and only one
    /// countdown runs per royale.
    pub async fn start_after_countdown(
        &self,
        royale_id: RoyaleId,
        actor: Option<&Identity>,
    ) -> RoyaleResult<JoinHandle<RoyaleResult<Bracket>>> {
        let royale = self.find_royale(royale_id).await?;
        if let Some(actor) = actor {
            Self::authorize_manage(&royale, actor)?;
        }
        if royale.status != RoyaleStatus::Waiting {
            return Err(RoyaleError::AlreadyStarted);
        }

        let current = self.ctx.store.participants(royale_id).await?.len();
        if current < MIN_PLAYERS {
            return Err(RoyaleError::InsufficientPlayers {
                needed: MIN_PLAYERS,
                current,
            });
        }

        let countdown = self.ctx.config.countdown_secs;
        let countdown_key = keys::royale_countdown(royale_id);
        let token = Uuid::new_v4().to_string();
        let hold = Duration::from_secs(u64::from(countdown)) + self.ctx.config.start_lock_ttl;
        if !self
            .ctx
            .coordination
            .try_lock(&countdown_key, &token, hold)
            .await?
        {
            return Err(RoyaleError::StartInProgress);
        }

        let manager = self.clone();

        Ok(tokio::spawn(async move {
            for seconds_left in (1..=countdown).rev() {
                manager
                    .ctx
                    .events
                    .to_royale(royale_id, RoyaleEvent::Countdown { seconds_left });
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let result = manager.start_locked(royale_id).await;
            if let Err(e) = manager
                .ctx
                .coordination
                .release_lock(&countdown_key, &token)
                .await
            {
                warn!("Failed to release countdown of royale {}: {}", royale_id, e);
            }
            if let Err(e) = &result {
                warn!("Countdown start of royale {} failed: {}", royale_id, e);
                manager.ctx.events.to_royale(
                    royale_id,
                    RoyaleEvent::Error {
                        message: e.client_message(),
                    },
                );
            }
            result
        }))
    }

    /// Start under the per-royale lock. A held lock means another start is running.
    async fn start_locked(&self, royale_id: RoyaleId) -> RoyaleResult<Bracket> {
        let lock_key = keys::royale_lock(royale_id);
        let token = Uuid::new_v4().to_string();

        if !self
            .ctx
            .coordination
            .try_lock(&lock_key, &token, self.ctx.config.start_lock_ttl)
            .await?
        {
            return Err(RoyaleError::StartInProgress);
        }

        let result = self.begin_tournament(royale_id).await;

        if let Err(e) = self.ctx.coordination.release_lock(&lock_key, &token).await {
            warn!("Failed to release start lock of royale {}: {}", royale_id, e);
        }
        result
    }

    /// Build the bracket and persist round one. The persist step is
    /// conditional on `waiting`, so a racing start fails with `AlreadyStarted`.
    async fn begin_tournament(&self, royale_id: RoyaleId) -> RoyaleResult<Bracket> {
        let royale = self.find_royale(royale_id).await?;
        match royale.status {
            RoyaleStatus::Waiting => {}
            RoyaleStatus::Cancelled => {
                return Err(RoyaleError::InvalidState {
                    expected: RoyaleStatus::Waiting,
                    actual: royale.status,
                });
            }
            _ => return Err(RoyaleError::AlreadyStarted),
        }

        let players: Vec<Player> = self
            .ctx
            .store
            .participants(royale_id)
            .await?
            .iter()
            .map(|p| p.player())
            .collect();
        if players.len() < MIN_PLAYERS {
            return Err(RoyaleError::InsufficientPlayers {
                needed: MIN_PLAYERS,
                current: players.len(),
            });
        }

        let bracket = build_bracket(&players)?;
        let pool = self.ctx.questions.pool(royale.difficulty).await?;
        let mut used = HashSet::new();

        let slots = bracket
            .first_round()
            .iter()
            .filter_map(|slot| {
                slot.player1
                    .clone()
                    .map(|p1| (p1, slot.player2.clone()))
            })
            .collect();
        // Only rounds built from winners can be finals, so a two-player
        // royale is decided first-to-pass
        let planned = plan_matches(1, slots, false, &pool, &mut used)?;

        let matches = self
            .ctx
            .store
            .start_royale(royale_id, bracket.total_rounds, planned)
            .await?
            .ok_or(RoyaleError::AlreadyStarted)?;

        self.store_used_questions(royale_id, &used).await;
        self.cache_match_starts(&matches).await;

        self.ctx.events.to_royale(
            royale_id,
            RoyaleEvent::TournamentStarting {
                bracket: bracket.clone(),
            },
        );
        self.announce_matches(&matches);

        info!(
            "Royale {} started with {} players over {} rounds",
            royale_id,
            players.len(),
            bracket.total_rounds
        );

        if matches.iter().all(Match::is_completed) {
            self.check_round_completion(royale_id, 1).await?;
        }

        Ok(bracket)
    }

    /// Advance the royale once every match of `round` is complete.
    ///
    /// Recomputed from durable state on every call. Persisting the next
    /// round is conditional on the royale still being on `round`, so
    /// redundant concurrent checks are no-ops. A freshly created round made
    /// only of byes is absorbed by the loop; each pass at least halves the
    /// number of live players, so it terminates.
    pub async fn check_round_completion(
        &self,
        royale_id: RoyaleId,
        round: u32,
    ) -> RoyaleResult<RoundOutcome> {
        let mut round = round;
        let mut outcome = RoundOutcome::Unchanged;

        loop {
            let royale = self.find_royale(royale_id).await?;
            if royale.status != RoyaleStatus::InProgress || royale.current_round != round {
                return Ok(outcome);
            }

            let matches = self.ctx.store.round_matches(royale_id, round).await?;
            if matches.is_empty() {
                return Ok(outcome);
            }
            if !matches.iter().all(Match::is_completed) {
                return Ok(match outcome {
                    RoundOutcome::Unchanged => RoundOutcome::Pending,
                    other => other,
                });
            }

            let winners: Vec<Player> = matches.iter().filter_map(|m| m.winner.clone()).collect();

            if let [winner] = winners.as_slice() {
                return Ok(match self.complete_tournament(royale_id, winner).await? {
                    Some(_) => RoundOutcome::Completed {
                        winner: winner.clone(),
                    },
                    None => outcome,
                });
            }
            if winners.is_empty() {
                warn!("Round {} of royale {} completed without winners", round, royale_id);
                return Ok(outcome);
            }

            let next_round = round + 1;
            let is_final = winners.len() == 2;
            let pool = self.ctx.questions.pool(royale.difficulty).await?;
            let mut used = self.used_questions(royale_id).await?;
            let planned = plan_matches(
                next_round,
                pair_sequentially(winners),
                is_final,
                &pool,
                &mut used,
            )?;

            let Some(created) = self
                .ctx
                .store
                .advance_round(royale_id, round, planned)
                .await?
            else {
                debug!(
                    "Round {} of royale {} was advanced concurrently",
                    round, royale_id
                );
                return Ok(outcome);
            };

            self.store_used_questions(royale_id, &used).await;
            self.cache_match_starts(&created).await;

            self.ctx.events.to_royale(
                royale_id,
                RoyaleEvent::RoundAdvance {
                    round: next_round,
                    matches: summarize(&created),
                },
            );
            self.announce_matches(&created);

            info!(
                "Royale {} advanced to round {} ({} matches{})",
                royale_id,
                next_round,
                created.len(),
                if is_final { ", final" } else { "" }
            );

            outcome = RoundOutcome::Advanced { round: next_round };
            if !created.iter().all(Match::is_completed) {
                return Ok(outcome);
            }
            round = next_round;
        }
    }

    /// Finish the royale and settle points. Returns None if it was already finished.
    pub async fn complete_tournament(
        &self,
        royale_id: RoyaleId,
        winner: &Player,
    ) -> RoyaleResult<Option<Vec<PointsAward>>> {
        let Some(awards) = self
            .ctx
            .store
            .complete_royale(royale_id, winner, self.ctx.config.winner_points)
            .await?
        else {
            return Ok(None);
        };

        self.ctx.events.to_royale(
            royale_id,
            RoyaleEvent::TournamentComplete {
                winner: winner.clone(),
                points_awarded: awards.clone(),
            },
        );

        info!(
            "Royale {} completed, {} wins {} points",
            royale_id, winner.username, self.ctx.config.winner_points
        );

        self.schedule_cleanup(royale_id);
        Ok(Some(awards))
    }

    fn schedule_cleanup(&self, royale_id: RoyaleId) {
        let coordination = self.ctx.coordination.clone();
        let delay = self.ctx.config.cleanup_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match coordination
                .delete_prefix(&keys::royale_prefix(royale_id))
                .await
            {
                Ok(removed) => debug!("Dropped {} coordination keys of royale {}", removed, royale_id),
                Err(e) => warn!("Cleanup of royale {} failed: {}", royale_id, e),
            }
        });
    }

    /// Royale with participants in join order and matches by round and index
    pub async fn royale_details(&self, royale_id: RoyaleId) -> RoyaleResult<RoyaleDetails> {
        let royale = self.find_royale(royale_id).await?;
        let participants = self.ctx.store.participants(royale_id).await?;
        let matches = self.ctx.store.matches(royale_id).await?;
        Ok(RoyaleDetails {
            royale,
            participants,
            matches,
        })
    }

    /// Flip a participant's connectivity flag. Never forfeits anything.
    /// A dropped connection is announced to the room as a disconnect.
    pub async fn set_connected(
        &self,
        royale_id: RoyaleId,
        user_id: &str,
        connected: bool,
    ) -> RoyaleResult<bool> {
        let updated = self
            .ctx
            .store
            .set_connected(royale_id, user_id, connected)
            .await?;
        if !updated || connected {
            return Ok(updated);
        }

        let participants = self.ctx.store.participants(royale_id).await?;
        if let Some(participant) = participants.iter().find(|p| p.user_id == user_id) {
            self.ctx.events.to_royale(
                royale_id,
                RoyaleEvent::PlayerLeft {
                    player: participant.player(),
                    player_count: participants.len() as u32,
                    kicked: false,
                    disconnected: true,
                },
            );
        }
        Ok(updated)
    }

    /// Question ids used so far, rebuilt from durable matches when the cache is gone
    async fn used_questions(&self, royale_id: RoyaleId) -> RoyaleResult<HashSet<String>> {
        let cached = self
            .ctx
            .coordination
            .get(&keys::used_questions(royale_id))
            .await
            .unwrap_or_else(|e| {
                warn!("Used-question cache of royale {} unavailable: {}", royale_id, e);
                None
            });

        if let Some(ids) = cached.and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok()) {
            return Ok(ids.into_iter().collect());
        }

        Ok(self
            .ctx
            .store
            .matches(royale_id)
            .await?
            .into_iter()
            .filter_map(|m| m.question.map(|q| q.id))
            .collect())
    }

    async fn store_used_questions(&self, royale_id: RoyaleId, used: &HashSet<String>) {
        let mut ids: Vec<&String> = used.iter().collect();
        ids.sort();
        let result = match serde_json::to_string(&ids) {
            Ok(raw) => self
                .ctx
                .coordination
                .set(&keys::used_questions(royale_id), &raw, self.ctx.config.state_ttl)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            warn!("Failed to cache used questions of royale {}: {}", royale_id, e);
        }
    }

    async fn cache_match_starts(&self, matches: &[Match]) {
        for m in matches.iter().filter(|m| !m.is_completed()) {
            let Some(started_at) = m.started_at else {
                continue;
            };
            if let Err(e) = self
                .ctx
                .coordination
                .set(
                    &keys::match_started(m.id),
                    &started_at.timestamp_millis().to_string(),
                    self.ctx.config.state_ttl,
                )
                .await
            {
                warn!("Failed to cache start of match {}: {}", m.id, e);
            }
        }
    }

    /// Tell each player of every live match who they face and what to solve
    fn announce_matches(&self, matches: &[Match]) {
        for m in matches.iter().filter(|m| !m.is_completed()) {
            let (Some(p1), Some(p2), Some(question)) = (&m.player1, &m.player2, &m.question) else {
                continue;
            };
            let question = question.public_view();

            for (player, opponent) in [(p1, p2), (p2, p1)] {
                self.ctx.events.to_user(
                    m.royale_id,
                    player.user_id.clone(),
                    RoyaleEvent::MatchStarted {
                        match_id: m.id,
                        round: m.round,
                        opponent: opponent.clone(),
                        question: question.clone(),
                        is_final: m.is_final,
                    },
                );
            }
        }
    }
}
