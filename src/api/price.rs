//! Price endpoint.

use super::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// `GET /price` — latest known BTC quote. Never blocks on the upstream.
pub async fn get_btc_price(State(state): State<AppState>) -> Json<Value> {
    let quote = state.engine.current_quote();
    Json(json!({
        "price": quote.price,
        "updatedAt": quote.updated_at,
    }))
}
