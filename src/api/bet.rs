//! Bet endpoints.

use super::AppState;
use crate::auth::AuthedUser;
use crate::game::{Direction, GameError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct BetRequest {
    pub direction: Direction,
}

/// `POST /bet` — check-then-register. The race between the check and the
/// create is accepted; see the engine docs.
pub async fn submit_bet(
    State(state): State<AppState>,
    Extension(AuthedUser(user_id)): Extension<AuthedUser>,
    Json(req): Json<BetRequest>,
) -> Response {
    let result = match state.engine.has_open_bet(&user_id).await {
        Ok(true) => Err(GameError::AlreadyOpen),
        Ok(false) => state.engine.register_bet(&user_id, req.direction).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(bet_id) => (StatusCode::ACCEPTED, Json(json!({ "betId": bet_id }))).into_response(),
        Err(GameError::AlreadyOpen) => (
            StatusCode::NOT_ACCEPTABLE,
            format!("User {user_id} already has an open bet"),
        )
            .into_response(),
        Err(GameError::Storage) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unexpected error submitting new bet for user with id {user_id}."),
        )
            .into_response(),
    }
}

/// `GET /bet/{id}` — read-through with lazy expiry.
pub async fn get_bet(
    State(state): State<AppState>,
    Extension(AuthedUser(user_id)): Extension<AuthedUser>,
    Path(bet_id): Path<String>,
) -> Response {
    match state.engine.get_bet(&user_id, &bet_id).await {
        Some(bet) => (
            StatusCode::OK,
            Json(json!({
                "direction": bet.direction,
                "state": bet.state,
                "submittedAt": bet.submitted_at,
                "priceAtCreation": bet.price_at_creation,
                "priceAtResolution": bet.price_at_resolution,
            })),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("Bet with id {bet_id} not found for user with id {user_id}."),
        )
            .into_response(),
    }
}
