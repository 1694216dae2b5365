//! Typed bet accessors over the persistence gateway.
//!
//! Failures surface as sentinel values (`None` / `false`) with the cause
//! logged; nothing here panics across the boundary. Business rules live in
//! the engine.

use super::models::{Bet, BetState, Direction};
use super::{fields, keys};
use crate::storage::{FieldChanges, GameStore};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[derive(Clone)]
pub struct BetStore {
    store: Arc<dyn GameStore>,
}

impl BetStore {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Create a new open bet and point the user's game at it, in a single
    /// transaction. Returns the new bet id, or `None` if the transaction did
    /// not commit (in which case no partial state is observable).
    pub async fn create_bet(
        &self,
        user_id: &str,
        direction: Direction,
        btc_price: f64,
    ) -> Option<String> {
        let id = Uuid::new_v4().to_string();
        let bet = Bet {
            id: id.clone(),
            direction,
            state: BetState::Open,
            submitted_at: Utc::now().timestamp_millis(),
            price_at_creation: btc_price,
            price_at_resolution: None,
        };

        let body = match serde_json::to_value(&bet) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "failed to serialize bet record");
                return None;
            }
        };

        let result = self
            .store
            .put_and_update(
                (keys::bet(user_id, &id), body),
                (keys::game(user_id), fields(json!({ "currentBet": id }))),
            )
            .await;

        match result {
            Ok(()) => Some(id),
            Err(e) => {
                error!(user_id, error = %e, "failed to create new bet");
                None
            }
        }
    }

    /// Point read of a single bet. `None` covers both a missing record and a
    /// storage failure; the latter is logged.
    pub async fn get_bet(&self, user_id: &str, bet_id: &str) -> Option<Bet> {
        let body = match self.store.get(&keys::bet(user_id, bet_id)).await {
            Ok(body) => body?,
            Err(e) => {
                error!(user_id, bet_id, error = %e, "failed to read bet");
                return None;
            }
        };

        match serde_json::from_value(body) {
            Ok(bet) => Some(bet),
            Err(e) => {
                error!(user_id, bet_id, error = %e, "corrupt bet record");
                None
            }
        }
    }

    /// Patch a single bet record.
    pub async fn update_bet(&self, user_id: &str, bet_id: &str, changes: FieldChanges) -> bool {
        match self.store.update(&keys::bet(user_id, bet_id), changes).await {
            Ok(()) => true,
            Err(e) => {
                error!(user_id, bet_id, error = %e, "failed to update bet");
                false
            }
        }
    }

    /// Single-record transition to `expired`. No score change by contract.
    pub async fn expire_bet(&self, user_id: &str, bet_id: &str) -> bool {
        self.update_bet(user_id, bet_id, fields(json!({ "state": "expired" })))
            .await
    }

    /// Atomic dual update of a bet and the owning user's game state. Both
    /// patches commit or neither does.
    pub async fn update_bet_and_game(
        &self,
        user_id: &str,
        bet_id: &str,
        bet_changes: FieldChanges,
        game_changes: FieldChanges,
    ) -> bool {
        let result = self
            .store
            .update_many(vec![
                (keys::bet(user_id, bet_id), bet_changes),
                (keys::game(user_id), game_changes),
            ])
            .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(user_id, bet_id, error = %e, "failed to update bet and game");
                false
            }
        }
    }
}
