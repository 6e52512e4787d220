//! Battle royale tournaments.
//!
//! A royale is a single-elimination bracket of coding duels:
//! - Creation by admins and teachers, joining by short code
//! - Bracket generation with byes for non-power-of-two fields
//! - Start under a per-royale lock, optionally after a countdown
//! - Round advancement recomputed from durable state
//! - Points settlement on completion
//!
//! ## Example
//!
//! ```no_run
//! use battle_royale::context::RoyaleContext;
//! use battle_royale::config::RoyaleConfig;
//! use battle_royale::evaluator::ProcessEvaluator;
//! use battle_royale::identity::{Identity, Role};
//! use battle_royale::royale::RoyaleManager;
//! use battle_royale::royale::models::CreateRoyaleRequest;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = RoyaleContext::in_memory(Arc::new(ProcessEvaluator::default()), RoyaleConfig::default());
//!     let manager = RoyaleManager::new(ctx);
//!
//!     let teacher = Identity::new("t1", "ms_frizzle", Role::Teacher);
//!     let royale = manager
//!         .create_royale(&teacher, CreateRoyaleRequest {
//!             title: "Friday Showdown".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("Join with code {}", royale.code);
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod standings;

pub use errors::{ErrorKind, RoyaleError, RoyaleResult};
pub use models::{
    CreateRoyaleRequest, Difficulty, JoinOutcome, Participant, PointsAward, Royale,
    RoyaleDetails, RoyaleId, RoyaleStatus, Visibility,
};
pub use orchestrator::{MIN_PLAYERS, RoundOutcome, RoyaleManager};
pub use standings::{LeaderboardPage, Standings, UserStats};
