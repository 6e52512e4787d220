//! Single-elimination bracket construction.
//!
//! Players are shuffled, the first `next_pow2(n) - n` of them receive a bye
//! in round one and the rest are paired in order. Later rounds are
//! allocated as empty placeholders that the orchestrator fills as winners
//! emerge.

use crate::identity::Player;
use crate::royale::{RoyaleError, RoyaleResult};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One slot of a bracket round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketSlot {
    pub match_index: u32,
    pub player1: Option<Player>,
    pub player2: Option<Player>,
}

impl BracketSlot {
    /// A slot with exactly one player. Byes are won automatically.
    pub fn is_bye(&self) -> bool {
        self.player1.is_some() && self.player2.is_none()
    }

    /// A slot not yet assigned any player
    pub fn is_placeholder(&self) -> bool {
        self.player1.is_none() && self.player2.is_none()
    }
}

/// Bracket skeleton produced at tournament start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub total_rounds: u32,
    /// `rounds[0]` is round one
    pub rounds: Vec<Vec<BracketSlot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    champion: Option<Player>,
}

impl Bracket {
    /// The winner of a single-player bracket, which has no rounds
    pub fn champion(&self) -> Option<&Player> {
        self.champion.as_ref()
    }

    /// Round one slots
    pub fn first_round(&self) -> &[BracketSlot] {
        self.rounds.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bye_count(&self) -> usize {
        self.first_round().iter().filter(|s| s.is_bye()).count()
    }
}

/// Build a bracket with the thread-local RNG
pub fn build_bracket(players: &[Player]) -> RoyaleResult<Bracket> {
    build_bracket_with(players, &mut rand::rng())
}

/// Build a bracket with the given RNG
pub fn build_bracket_with<R: Rng + ?Sized>(
    players: &[Player],
    rng: &mut R,
) -> RoyaleResult<Bracket> {
    if players.is_empty() {
        return Err(RoyaleError::Validation(
            "Cannot build a bracket without players".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(players.len());
    if !players.iter().all(|p| seen.insert(p.user_id.as_str())) {
        return Err(RoyaleError::Validation(
            "Duplicate players in bracket".to_string(),
        ));
    }

    if players.len() == 1 {
        return Ok(Bracket {
            total_rounds: 0,
            rounds: Vec::new(),
            champion: Some(players[0].clone()),
        });
    }

    let mut shuffled = players.to_vec();
    shuffled.shuffle(rng);

    let size = shuffled.len().next_power_of_two();
    let bye_count = size - shuffled.len();
    let total_rounds = size.trailing_zeros();

    let mut first_round = Vec::with_capacity(size / 2);
    let mut remaining = shuffled.into_iter();

    for _ in 0..bye_count {
        first_round.push(BracketSlot {
            match_index: first_round.len() as u32,
            player1: remaining.next(),
            player2: None,
        });
    }

    while let Some(player1) = remaining.next() {
        first_round.push(BracketSlot {
            match_index: first_round.len() as u32,
            player1: Some(player1),
            player2: remaining.next(),
        });
    }

    let mut rounds = Vec::with_capacity(total_rounds as usize);
    let mut slots = first_round.len();
    rounds.push(first_round);

    for _ in 1..total_rounds {
        slots = slots.div_ceil(2);
        rounds.push(
            (0..slots)
                .map(|i| BracketSlot {
                    match_index: i as u32,
                    player1: None,
                    player2: None,
                })
                .collect(),
        );
    }

    Ok(Bracket {
        total_rounds,
        rounds,
        champion: None,
    })
}
