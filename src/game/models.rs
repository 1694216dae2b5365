//! Game records and enums as persisted in the record store and exposed to
//! the API layer.

use serde::{Deserialize, Serialize};

/// Which way the user expects the BTC price to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Bet lifecycle state. The only legal transitions leave `Open`; the four
/// other states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetState {
    Open,
    Expired,
    Won,
    Lost,
    Draw,
}

impl BetState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BetState::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BetState::Open => "open",
            BetState::Expired => "expired",
            BetState::Won => "won",
            BetState::Lost => "lost",
            BetState::Draw => "draw",
        }
    }
}

/// Outcome label shown on the scoreboard. `New` until the first bet resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastResult {
    Won,
    Lost,
    Draw,
    New,
}

/// A single wager. `price_at_resolution` is set iff the state is one of
/// won/lost/draw; an expired bet never carries one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: String,
    pub direction: Direction,
    pub state: BetState,
    /// Submission time, epoch milliseconds.
    pub submitted_at: i64,
    pub price_at_creation: f64,
    pub price_at_resolution: Option<f64>,
}

/// Per-user scoreboard. `current_bet` is a pointer to the most recently
/// created bet ("" = none); it may reference a bet that has since left the
/// open state, so readers re-validate instead of trusting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGame {
    pub score: u32,
    pub current_bet: String,
    pub last_result: LastResult,
}

impl UserGame {
    pub fn new() -> Self {
        Self {
            score: 0,
            current_bet: String::new(),
            last_result: LastResult::New,
        }
    }
}

impl Default for UserGame {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
}

/// Server-side copy of an issued refresh token, keyed by its `jti`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserToken {
    pub refresh_token: String,
}
