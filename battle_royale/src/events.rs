//! Outbound tournament notifications.
//!
//! Events are addressed either to everyone in a royale room or to a single
//! user and fanned out over a tokio broadcast channel. Transports subscribe
//! and filter by audience. Publishing never fails: with no subscribers the
//! event is dropped.

use crate::bracket::Bracket;
use crate::identity::{Player, UserId};
use crate::matches::MatchId;
use crate::questions::PublicQuestion;
use crate::royale::models::{PointsAward, RoyaleId};
use serde::Serialize;
use tokio::sync::broadcast;

/// Default channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Summary of a match for round announcements
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub match_index: u32,
    pub player1: Option<Player>,
    pub player2: Option<Player>,
    pub is_bye: bool,
    pub is_final: bool,
}

/// Notification payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoyaleEvent {
    PlayerJoined {
        player: Player,
        player_count: u32,
        max_players: u32,
    },
    PlayerLeft {
        player: Player,
        player_count: u32,
        kicked: bool,
        /// Only the connection dropped; the player is still entered
        disconnected: bool,
    },
    Countdown {
        seconds_left: u32,
    },
    TournamentStarting {
        bracket: Bracket,
    },
    MatchStarted {
        match_id: MatchId,
        round: u32,
        opponent: Player,
        question: PublicQuestion,
        is_final: bool,
    },
    OpponentProgress {
        match_id: MatchId,
        percentage: u32,
    },
    MatchResult {
        match_id: MatchId,
        round: u32,
        winner: Player,
        forfeit: bool,
    },
    RoundAdvance {
        round: u32,
        matches: Vec<MatchSummary>,
    },
    Eliminated {
        round: u32,
        defeated_by: Player,
    },
    TournamentComplete {
        winner: Player,
        points_awarded: Vec<PointsAward>,
    },
    Error {
        message: String,
    },
}

/// Who an event is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Audience {
    Royale { royale_id: RoyaleId },
    User { royale_id: RoyaleId, user_id: UserId },
}

impl Audience {
    pub fn royale_id(&self) -> RoyaleId {
        match self {
            Audience::Royale { royale_id } | Audience::User { royale_id, .. } => *royale_id,
        }
    }

    /// Whether a connection of `user_id` in `royale_id` should receive it
    pub fn includes(&self, royale_id: RoyaleId, user_id: &str) -> bool {
        match self {
            Audience::Royale { royale_id: r } => *r == royale_id,
            Audience::User {
                royale_id: r,
                user_id: u,
            } => *r == royale_id && u == user_id,
        }
    }
}

/// An addressed event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub audience: Audience,
    pub event: RoyaleEvent,
}

/// Broadcast hub for royale events
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<Envelope>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    pub fn publish(&self, audience: Audience, event: RoyaleEvent) {
        // Err only means nobody is listening
        let _ = self.sender.send(Envelope { audience, event });
    }

    pub fn to_royale(&self, royale_id: RoyaleId, event: RoyaleEvent) {
        self.publish(Audience::Royale { royale_id }, event);
    }

    pub fn to_user(&self, royale_id: RoyaleId, user_id: impl Into<UserId>, event: RoyaleEvent) {
        self.publish(
            Audience::User {
                royale_id,
                user_id: user_id.into(),
            },
            event,
        );
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
