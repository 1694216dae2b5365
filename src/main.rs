//! Betcoin backend: a BTC up/down prediction game.
//!
//! Wires together the SQLite-backed record store, the BTC price feed, the
//! bet lifecycle engine, and the axum HTTP surface.

use anyhow::{Context, Result};
use betcoin_backend::{
    api::{router, AppState},
    auth::JwtHandler,
    config::Config,
    game::{BetEngine, UserStore},
    middleware::RateLimiter,
    price::PriceFeed,
    storage::{GameStore, SqliteStore},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;

    let store: Arc<dyn GameStore> = Arc::new(SqliteStore::new(&config.db_path)?);
    info!(path = %config.db_path, "game database initialized");

    let feed = PriceFeed::new(config.coindesk_api_url.clone(), config.price_fetch_timeout)?;
    feed.spawn_poller(config.price_poll_interval);

    let engine = BetEngine::new(store.clone(), feed, config.engine_config());
    let users = UserStore::new(store);
    let jwt = Arc::new(JwtHandler::new(
        config.jwt_access_secret.clone(),
        config.jwt_refresh_secret.clone(),
        config.jwt_access_ttl,
        config.jwt_refresh_ttl,
    ));

    let limiter = RateLimiter::new(config.rate_limit_config());
    limiter.spawn_cleanup(Duration::from_secs(60));

    let app = router(AppState { engine, users, jwt }, limiter)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "betcoin backend listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "betcoin_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
