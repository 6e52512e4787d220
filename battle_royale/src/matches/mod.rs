//! Head-to-head matches inside a royale.

pub mod manager;
pub mod models;
pub mod resolution;

pub use manager::{MatchManager, SweepReport};
pub use models::{
    Match, MatchId, MatchStatus, NewMatch, NewSubmission, Submission, SubmissionReceipt,
};
pub use resolution::{Attempt, Side, decide_final, decide_forfeit};
