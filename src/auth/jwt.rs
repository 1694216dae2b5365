//! JWT issue and validation.
//!
//! Two token kinds with separate secrets: a short-lived access token carrying
//! only `sub`, and a long-lived refresh token carrying `sub` + `jti` so the
//! server-side copy can be looked up and revoked.

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    /// Id of the stored server-side token record.
    pub jti: String,
    pub exp: usize,
}

/// A freshly issued token pair plus the refresh token's storage id.
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_id: String,
}

pub struct JwtHandler {
    access_secret: String,
    refresh_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtHandler {
    pub fn new(
        access_secret: String,
        refresh_secret: String,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_secret,
            refresh_secret,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issue a fresh access + refresh pair for a user.
    pub fn issue_pair(&self, user_id: &str) -> Result<TokenPair> {
        let refresh_token_id = Uuid::new_v4().to_string();

        let access_claims = AccessClaims {
            sub: user_id.to_string(),
            exp: expiry(self.access_ttl)?,
        };
        let refresh_claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: refresh_token_id.clone(),
            exp: expiry(self.refresh_ttl)?,
        };

        let access_token = encode(
            &Header::default(),
            &access_claims,
            &EncodingKey::from_secret(self.access_secret.as_bytes()),
        )
        .context("failed to sign access token")?;

        let refresh_token = encode(
            &Header::default(),
            &refresh_claims,
            &EncodingKey::from_secret(self.refresh_secret.as_bytes()),
        )
        .context("failed to sign refresh token")?;

        debug!(user_id, "issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_token_id,
        })
    }

    pub fn validate_access(&self, token: &str) -> Result<AccessClaims> {
        let decoded = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.access_secret.as_bytes()),
            &Validation::default(),
        )
        .context("invalid or expired access token")?;
        Ok(decoded.claims)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<RefreshClaims> {
        let decoded = decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(self.refresh_secret.as_bytes()),
            &Validation::default(),
        )
        .context("invalid or expired refresh token")?;
        Ok(decoded.claims)
    }
}

fn expiry(ttl: Duration) -> Result<usize> {
    let exp = Utc::now()
        .checked_add_signed(chrono::Duration::from_std(ttl).context("ttl out of range")?)
        .context("invalid expiry timestamp")?
        .timestamp();
    Ok(exp as usize)
}
