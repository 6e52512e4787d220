//! # Battle Royale
//!
//! A single-elimination coding tournament engine. Players join a royale by
//! code, are seeded into a bracket with byes for non-power-of-two fields, and
//! advance round by round by solving programming questions faster than their
//! opponent. The winner of the final collects points on a global leaderboard.
//!
//! ## Architecture
//!
//! The durable store is the single source of truth. Every state transition
//! is one atomic, conditional store operation, so concurrent callers can
//! race freely and a lost race is a no-op:
//!
//! - **Waiting**: royale created, participants joining by code
//! - **InProgress**: bracket built, rounds of matches running
//! - **Completed**: champion recorded, points settled
//!
//! Short-lived data (player counters, start locks, match start times) lives in
//! a coordination store and can always be rebuilt.
//!
//! ## Core Modules
//!
//! - [`royale`]: Tournament orchestration and standings
//! - [`matches`]: Submissions and winner resolution
//! - [`bracket`]: Bracket generation
//! - [`evaluator`]: Grading and complexity estimation
//! - [`db`]: PostgreSQL and in-memory stores
//! - [`coordination`]: Redis and in-memory coordination
//! - [`events`]: Outbound notifications
//!
//! ## Example
//!
//! ```
//! use battle_royale::bracket::build_bracket;
//! use battle_royale::identity::Player;
//!
//! let players: Vec<Player> = (0..5)
//!     .map(|i| Player::new(format!("u{i}"), format!("player{i}")))
//!     .collect();
//! let bracket = build_bracket(&players).unwrap();
//! assert_eq!(bracket.total_rounds, 3);
//! assert_eq!(bracket.bye_count(), 3);
//! ```

/// Bracket generation.
pub mod bracket;
/// Join code generation.
pub mod codes;
/// Engine configuration.
pub mod config;
/// Shared collaborators.
pub mod context;
/// Short-lived coordination state.
pub mod coordination;
/// Durable persistence.
pub mod db;
/// Solution grading.
pub mod evaluator;
/// Outbound notifications.
pub mod events;
/// Authenticated users and roles.
pub mod identity;
/// Matches and submissions.
pub mod matches;
/// Question content.
pub mod questions;
/// Tournament lifecycle.
pub mod royale;

pub use bracket::{Bracket, BracketSlot, build_bracket};
pub use config::RoyaleConfig;
pub use context::RoyaleContext;
pub use events::{Audience, Envelope, EventHub, RoyaleEvent};
pub use identity::{Identity, Player, Role, UserId};
pub use matches::{MatchManager, SubmissionReceipt, SweepReport};
pub use royale::{
    ErrorKind, RoundOutcome, RoyaleError, RoyaleManager, RoyaleResult, Standings,
};
