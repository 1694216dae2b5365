//! Bet lifecycle and game state.
//!
//! `engine` is the orchestrator; `bet_store` and `user_store` are thin typed
//! accessors over the persistence gateway with no business rules of their
//! own.

pub mod bet_store;
pub mod engine;
pub mod models;
pub mod user_store;

pub use bet_store::BetStore;
pub use engine::{BetEngine, EngineConfig, GameError};
pub use models::{Bet, BetState, Direction, LastResult, UserGame, UserProfile, UserToken};
pub use user_store::UserStore;

use crate::storage::{FieldChanges, RecordKey};

/// Key schema shared by the typed stores. One partition per user, separate
/// sort keys for profile, game state, tokens, and individual bets.
pub(crate) mod keys {
    use super::RecordKey;

    pub fn profile(user_id: &str) -> RecordKey {
        RecordKey::new(format!("user#{user_id}"), "profile")
    }

    pub fn game(user_id: &str) -> RecordKey {
        RecordKey::new(format!("user#{user_id}#game"), "game")
    }

    pub fn bet(user_id: &str, bet_id: &str) -> RecordKey {
        RecordKey::new(format!("user#{user_id}#bets"), format!("bet#{bet_id}"))
    }

    pub fn token(user_id: &str, token_id: &str) -> RecordKey {
        RecordKey::new(format!("user#{user_id}"), format!("token#{token_id}"))
    }
}

/// Build a field patch from a `json!` object literal.
pub(crate) fn fields(value: serde_json::Value) -> FieldChanges {
    match value {
        serde_json::Value::Object(map) => map,
        _ => unreachable!("field patches are always object literals"),
    }
}
