//! Environment-driven configuration. Every knob has a sane default so the
//! service starts with an empty environment.

use crate::game::EngineConfig;
use crate::middleware::RateLimitConfig;
use anyhow::Result;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,

    pub coindesk_api_url: String,
    pub price_poll_interval: Duration,
    pub price_fetch_timeout: Duration,

    pub resolution_window: Duration,
    pub overdue_threshold: Duration,

    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_access_ttl: Duration,
    pub jwt_refresh_ttl: Duration,

    pub rate_limit_max_requests: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            host: env_or("HOST", "0.0.0.0"),
            port: parse_or("PORT", 3000),
            db_path: env_or("GAME_DB_PATH", "./betcoin.db"),

            coindesk_api_url: env_or(
                "COINDESK_API_URL",
                "https://api.coindesk.com/v1/bpi/currentprice.json",
            ),
            price_poll_interval: Duration::from_millis(parse_or("COINDESK_API_POLLING_RATE_MS", 30_000)),
            price_fetch_timeout: Duration::from_millis(parse_or("COINDESK_API_TIMEOUT_MS", 1_500)),

            resolution_window: Duration::from_secs(parse_or("BET_RESOLUTION_WINDOW_SECS", 60)),
            overdue_threshold: Duration::from_secs(parse_or("BET_OVERDUE_THRESHOLD_SECS", 90)),

            jwt_access_secret: env_or(
                "JWT_ACCESS_TOKEN_SECRET",
                "dev-access-secret-change-in-production",
            ),
            jwt_refresh_secret: env_or(
                "JWT_REFRESH_TOKEN_SECRET",
                "dev-refresh-secret-change-in-production",
            ),
            jwt_access_ttl: Duration::from_secs(parse_or("JWT_ACCESS_TOKEN_TTL_SECS", 5 * 60)),
            jwt_refresh_ttl: Duration::from_secs(parse_or("JWT_REFRESH_TOKEN_TTL_SECS", 12 * 3600)),

            rate_limit_max_requests: parse_or("RATE_LIMITING_MAX_REQUESTS", 250),
            rate_limit_window: Duration::from_secs(parse_or("RATE_LIMITING_WINDOW_MIN", 15) * 60),
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            resolution_window: self.resolution_window,
            overdue_threshold: self.overdue_threshold,
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit_max_requests,
            window: self.rate_limit_window,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
