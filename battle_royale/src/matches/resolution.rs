//! Winner determination rules.
//!
//! Pure functions over submission summaries; the match manager feeds them
//! and applies the result.

use super::models::Submission;
use crate::evaluator::ComplexityClass;
use std::cmp::Ordering;

/// Which slot of a match won
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Player1,
    Player2,
}

/// The parts of a submission that decide a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub passed: bool,
    pub passed_count: u32,
    pub elapsed_ms: i64,
    pub complexity: ComplexityClass,
    /// Insertion order; lower was submitted earlier
    pub sequence: i64,
}

impl From<&Submission> for Attempt {
    fn from(s: &Submission) -> Self {
        Self {
            passed: s.passed,
            passed_count: s.passed_count,
            elapsed_ms: s.elapsed_ms,
            complexity: s.complexity,
            sequence: s.sequence,
        }
    }
}

fn pick(order: Ordering) -> Side {
    match order {
        Ordering::Greater => Side::Player2,
        _ => Side::Player1,
    }
}

/// Final round: time, then complexity, then submission order.
///
/// Only called once both players have submitted. If exactly one passed it
/// wins; if neither passed player one takes it.
pub fn decide_final(player1: &Attempt, player2: &Attempt) -> Side {
    match (player1.passed, player2.passed) {
        (true, true) => pick(
            player1
                .elapsed_ms
                .cmp(&player2.elapsed_ms)
                .then(player1.complexity.rank().cmp(&player2.complexity.rank()))
                .then(player1.sequence.cmp(&player2.sequence)),
        ),
        (true, false) => Side::Player1,
        (false, true) => Side::Player2,
        (false, false) => Side::Player1,
    }
}

/// Stalled match resolution.
///
/// A passing attempt wins (final rules if both passed); otherwise the
/// attempt with more passed cases wins, ties going to the earlier one. With
/// no attempts at all player one advances.
pub fn decide_forfeit(player1: Option<&Attempt>, player2: Option<&Attempt>) -> Side {
    match (player1, player2) {
        (None, None) => Side::Player1,
        (Some(_), None) => Side::Player1,
        (None, Some(_)) => Side::Player2,
        (Some(a), Some(b)) if a.passed || b.passed => decide_final(a, b),
        (Some(a), Some(b)) => pick(
            b.passed_count
                .cmp(&a.passed_count)
                .then(a.sequence.cmp(&b.sequence)),
        ),
    }
}
