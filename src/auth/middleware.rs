//! Authentication middleware: validates the bearer access token and injects
//! the authenticated user id into request extensions.

use super::jwt::JwtHandler;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Authenticated user id, available to handlers behind the middleware.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub String);

pub async fn auth_middleware(
    State(jwt): State<Arc<JwtHandler>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    let claims = jwt.validate_access(token).map_err(|e| {
        debug!(error = %e, "access token validation failed");
        AuthError::InvalidToken
    })?;

    req.extensions_mut().insert(AuthedUser(claims.sub));
    Ok(next.run(req).await)
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
        };
        (status, message).into_response()
    }
}
