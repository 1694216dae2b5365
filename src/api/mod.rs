//! HTTP surface: route table and shared application state.

pub mod bet;
pub mod price;
pub mod user;

use crate::auth::{auth_middleware, JwtHandler};
use crate::game::{BetEngine, UserStore};
use crate::middleware::{rate_limit_middleware, RateLimiter};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BetEngine>,
    pub users: UserStore,
    pub jwt: Arc<JwtHandler>,
}

/// Build the full route table. Game and profile routes sit behind the auth
/// middleware; registration, login, token handling, price, and health are
/// public. The rate limiter wraps everything.
pub fn router(state: AppState, limiter: RateLimiter) -> Router {
    let protected = Router::new()
        .route("/bet", post(bet::submit_bet))
        .route("/bet/:id", get(bet::get_bet))
        .route("/user/profile", get(user::get_profile))
        .route("/user/game", get(user::get_game))
        .route_layer(from_fn_with_state(state.jwt.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/price", get(price::get_btc_price))
        .route("/user/register", post(user::register))
        .route("/user/login", post(user::login))
        .route("/user/auth/refresh", post(user::refresh))
        .route("/user/auth/logout", post(user::logout))
        .merge(protected)
        .layer(from_fn_with_state(limiter, rate_limit_middleware))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
