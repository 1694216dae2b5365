//! Typed user accessors: profile, game state, and stored refresh tokens.
//!
//! Same sentinel-failure contract as the bet store.

use super::keys;
use super::models::{UserGame, UserProfile, UserToken};
use crate::storage::GameStore;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[derive(Clone)]
pub struct UserStore {
    store: Arc<dyn GameStore>,
}

impl UserStore {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Create a user profile together with a fresh game state in one atomic
    /// multi-put. Returns the new user id.
    pub async fn create_user(&self, name: &str) -> Option<String> {
        let id = Uuid::new_v4().to_string();
        let profile = UserProfile { name: name.to_string() };
        let game = UserGame::new();

        let items = match (serde_json::to_value(&profile), serde_json::to_value(&game)) {
            (Ok(profile_body), Ok(game_body)) => vec![
                (keys::profile(&id), profile_body),
                (keys::game(&id), game_body),
            ],
            _ => {
                error!("failed to serialize new user records");
                return None;
            }
        };

        match self.store.put_many(items).await {
            Ok(()) => Some(id),
            Err(e) => {
                error!(name, error = %e, "failed to create new user");
                None
            }
        }
    }

    pub async fn get_user(&self, user_id: &str) -> Option<UserProfile> {
        self.read(keys::profile(user_id), user_id, "profile").await
    }

    pub async fn get_user_game(&self, user_id: &str) -> Option<UserGame> {
        self.read(keys::game(user_id), user_id, "game state").await
    }

    /// Store the server-side copy of a freshly issued refresh token.
    pub async fn add_user_token(&self, user_id: &str, token_id: &str, refresh_token: &str) -> bool {
        let token = UserToken {
            refresh_token: refresh_token.to_string(),
        };
        let body = match serde_json::to_value(&token) {
            Ok(body) => body,
            Err(e) => {
                error!(user_id, error = %e, "failed to serialize token record");
                return false;
            }
        };

        match self.store.put(&keys::token(user_id, token_id), body).await {
            Ok(()) => true,
            Err(e) => {
                error!(user_id, token_id, error = %e, "failed to store refresh token");
                false
            }
        }
    }

    pub async fn get_user_token(&self, user_id: &str, token_id: &str) -> Option<UserToken> {
        self.read(keys::token(user_id, token_id), user_id, "refresh token")
            .await
    }

    /// Revoke a refresh token. `false` when the token was already gone or
    /// the delete did not commit.
    pub async fn delete_user_token(&self, user_id: &str, token_id: &str) -> bool {
        match self.store.delete(&keys::token(user_id, token_id)).await {
            Ok(()) => true,
            Err(e) => {
                error!(user_id, token_id, error = %e, "failed to delete refresh token");
                false
            }
        }
    }

    async fn read<T: serde::de::DeserializeOwned>(
        &self,
        key: crate::storage::RecordKey,
        user_id: &str,
        what: &'static str,
    ) -> Option<T> {
        let body = match self.store.get(&key).await {
            Ok(body) => body?,
            Err(e) => {
                error!(user_id, error = %e, "failed to read {}", what);
                return None;
            }
        };

        match serde_json::from_value(body) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(user_id, error = %e, "corrupt {} record", what);
                None
            }
        }
    }
}
