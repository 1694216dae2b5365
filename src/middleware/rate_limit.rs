//! Rate limiting middleware.
//!
//! In-memory sliding window per client IP, applied to the whole router.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window per IP.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 250,
            window: Duration::from_secs(15 * 60),
        }
    }
}

struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Shared limiter state, cloned into the middleware per request.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<IpAddr, WindowEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count a request from `ip`; returns false once the window is full.
    fn allow(&self, ip: IpAddr) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();

        let entry = state.entry(ip).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        entry.count <= self.config.max_requests
    }

    /// Drop windows that expired a while ago. Called from a background task.
    pub fn cleanup(&self) {
        let window = self.config.window;
        let now = Instant::now();
        self.state
            .lock()
            .retain(|_, entry| now.duration_since(entry.window_start) < window * 2);
    }

    /// Spawn the periodic cleanup task.
    pub fn spawn_cleanup(&self, interval: Duration) {
        let limiter = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                limiter.cleanup();
            }
        });
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    if !limiter.allow(addr.ip()) {
        warn!(ip = %addr.ip(), "rate limit exceeded");
        return (StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response();
    }
    next.run(req).await
}
