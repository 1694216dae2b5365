//! User endpoints: registration, login, token rotation, profile and
//! scoreboard reads.

use super::AppState;
use crate::auth::AuthedUser;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub refresh_token: String,
}

/// `POST /user/register` — create profile + game state atomically, then
/// issue a token pair.
pub async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> Response {
    let name = req.name.trim();
    if name.len() < 3 || name.len() > 63 {
        return (
            StatusCode::BAD_REQUEST,
            "Name must be between 3 and 63 characters.",
        )
            .into_response();
    }

    let Some(user_id) = state.users.create_user(name).await else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create new user.",
        )
            .into_response();
    };

    debug!(user_id, "created new user");
    issue_tokens(&state, &user_id, StatusCode::OK).await
}

/// `POST /user/login` — login is by user id; there are no passwords in this
/// game.
pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Response {
    match state.users.get_user(&req.user_id).await {
        Some(_) => issue_tokens(&state, &req.user_id, StatusCode::OK).await,
        None => (
            StatusCode::NOT_FOUND,
            format!("Profile for user with id {} not found", req.user_id),
        )
            .into_response(),
    }
}

/// `POST /user/auth/refresh` — rotate the refresh token: the presented token
/// must match the stored copy, which is deleted before a new pair is issued.
pub async fn refresh(State(state): State<AppState>, Json(req): Json<TokenRequest>) -> Response {
    match consume_refresh_token(&state, &req.refresh_token).await {
        Some(user_id) => issue_tokens(&state, &user_id, StatusCode::OK).await,
        None => StatusCode::FORBIDDEN.into_response(),
    }
}

/// `POST /user/auth/logout` — revoke the stored refresh token.
pub async fn logout(State(state): State<AppState>, Json(req): Json<TokenRequest>) -> Response {
    match consume_refresh_token(&state, &req.refresh_token).await {
        Some(_) => StatusCode::OK.into_response(),
        None => StatusCode::FORBIDDEN.into_response(),
    }
}

/// `GET /user/profile`
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(AuthedUser(user_id)): Extension<AuthedUser>,
) -> Response {
    match state.users.get_user(&user_id).await {
        Some(profile) => (
            StatusCode::OK,
            Json(json!({ "id": user_id, "name": profile.name })),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("Profile for user with id {user_id} not found"),
        )
            .into_response(),
    }
}

/// `GET /user/game`
pub async fn get_game(
    State(state): State<AppState>,
    Extension(AuthedUser(user_id)): Extension<AuthedUser>,
) -> Response {
    match state.users.get_user_game(&user_id).await {
        Some(game) => (StatusCode::OK, Json(game)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("Game for user with id {user_id} not found"),
        )
            .into_response(),
    }
}

/// Validate a presented refresh token against the stored copy and delete
/// it. Returns the owning user id only when every step succeeds.
async fn consume_refresh_token(state: &AppState, refresh_token: &str) -> Option<String> {
    let claims = match state.jwt.validate_refresh(refresh_token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "failed to validate refresh token");
            return None;
        }
    };

    let stored = state.users.get_user_token(&claims.sub, &claims.jti).await?;
    if stored.refresh_token != refresh_token {
        return None;
    }

    if !state.users.delete_user_token(&claims.sub, &claims.jti).await {
        return None;
    }

    Some(claims.sub)
}

async fn issue_tokens(state: &AppState, user_id: &str, status: StatusCode) -> Response {
    let pair = match state.jwt.issue_pair(user_id) {
        Ok(pair) => pair,
        Err(e) => {
            error!(user_id, error = %e, "failed to issue token pair");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !state
        .users
        .add_user_token(user_id, &pair.refresh_token_id, &pair.refresh_token)
        .await
    {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        status,
        Json(json!({
            "userId": user_id,
            "accessToken": pair.access_token,
            "refreshToken": pair.refresh_token,
        })),
    )
        .into_response()
}
