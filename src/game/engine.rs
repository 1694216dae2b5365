//! Bet lifecycle engine.
//!
//! Orchestrates the state machine `open -> won | lost | draw | expired`.
//! Two mechanisms drive a bet out of the open state:
//!
//! - a deferred resolution task spawned at registration, firing after the
//!   resolution window;
//! - lazy expiry on every read path, which transitions overdue bets even if
//!   the scheduled task was lost to a restart.
//!
//! Both are idempotent: resolution and expiry no-op on any non-open state,
//! so duplicate or late firings are harmless. The overdue threshold is
//! strictly larger than the resolution window, giving the scheduled resolver
//! a grace period before the lazy path preempts it.

use super::bet_store::BetStore;
use super::fields;
use super::models::{Bet, BetState, Direction};
use super::user_store::UserStore;
use crate::price::{BtcQuote, PriceFeed};
use crate::storage::GameStore;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// Caller-facing rejection taxonomy. Background failures are logged, not
/// surfaced, because nothing awaits them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("user already has an open bet")]
    AlreadyOpen,
    #[error("storage operation failed")]
    Storage,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Delay between submission and the scheduled resolution.
    pub resolution_window: Duration,
    /// Age at which an open bet can no longer be resolved fairly and is
    /// expired instead. Must exceed `resolution_window`.
    pub overdue_threshold: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolution_window: Duration::from_secs(60),
            overdue_threshold: Duration::from_secs(90),
        }
    }
}

pub struct BetEngine {
    bets: BetStore,
    users: UserStore,
    feed: Arc<PriceFeed>,
    config: EngineConfig,
}

impl BetEngine {
    pub fn new(store: Arc<dyn GameStore>, feed: Arc<PriceFeed>, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            bets: BetStore::new(store.clone()),
            users: UserStore::new(store),
            feed,
            config,
        })
    }

    /// Register a new bet at the current quote and schedule its resolution.
    ///
    /// The caller is expected to have checked `has_open_bet` first; the
    /// engine does not re-validate, so two near-simultaneous registrations
    /// for one user can both succeed. The earlier bet is then orphaned from
    /// the scoreboard pointer but still resolves through its own timer and
    /// the lazy-expiry backstop.
    pub async fn register_bet(
        self: &Arc<Self>,
        user_id: &str,
        direction: Direction,
    ) -> Result<String, GameError> {
        let quote = self.feed.current_quote();
        let bet_id = self
            .bets
            .create_bet(user_id, direction, quote.price)
            .await
            .ok_or(GameError::Storage)?;

        debug!(user_id, bet_id, price = quote.price, "registered new bet");

        let engine = self.clone();
        let user = user_id.to_string();
        let id = bet_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(engine.config.resolution_window).await;
            engine.resolve_bet(&user, &id).await;
        });

        Ok(bet_id)
    }

    /// Whether the user's current bet is still open. Expires an overdue
    /// current bet on the way through.
    pub async fn has_open_bet(&self, user_id: &str) -> Result<bool, GameError> {
        let game = self.users.get_user_game(user_id).await.ok_or_else(|| {
            error!(user_id, "failed to retrieve open bets for user");
            GameError::Storage
        })?;

        if game.current_bet.is_empty() {
            return Ok(false);
        }

        // The pointer can be stale; the bet record is authoritative.
        let Some(bet) = self.bets.get_bet(user_id, &game.current_bet).await else {
            return Ok(false);
        };

        if bet.state != BetState::Open {
            return Ok(false);
        }

        if self.is_overdue(&bet) {
            self.bets.expire_bet(user_id, &bet.id).await;
            return Ok(false);
        }

        Ok(true)
    }

    /// Read-through with lazy expiry: an overdue bet is expired in place and
    /// returned in its expired state.
    pub async fn get_bet(&self, user_id: &str, bet_id: &str) -> Option<Bet> {
        let mut bet = self.bets.get_bet(user_id, bet_id).await?;

        if self.is_overdue(&bet) && self.bets.expire_bet(user_id, bet_id).await {
            bet.state = BetState::Expired;
        }

        Some(bet)
    }

    /// Resolve a bet against the current quote. Invoked by the scheduled
    /// task; fire-and-forget, all failure paths log and return.
    pub async fn resolve_bet(&self, user_id: &str, bet_id: &str) {
        let bet = self.bets.get_bet(user_id, bet_id).await;
        let game = self.users.get_user_game(user_id).await;
        let quote = self.feed.current_quote();

        let (Some(bet), Some(game)) = (bet, game) else {
            error!(user_id, bet_id, "unable to resolve bet, record missing");
            return;
        };

        // Already resolved or expired by the lazy path.
        if bet.state != BetState::Open {
            return;
        }

        if self.is_overdue(&bet) {
            // Too old to resolve fairly.
            self.bets.expire_bet(user_id, bet_id).await;
            return;
        }

        let won = (quote.price > bet.price_at_creation && bet.direction == Direction::Up)
            || (quote.price < bet.price_at_creation && bet.direction == Direction::Down);

        let (bet_changes, game_changes, outcome) = if won {
            (
                fields(json!({ "state": "won", "priceAtResolution": quote.price })),
                fields(json!({ "score": game.score + 1, "lastResult": "won" })),
                BetState::Won,
            )
        } else if quote.price == bet.price_at_creation {
            (
                fields(json!({ "state": "draw", "priceAtResolution": quote.price })),
                fields(json!({ "lastResult": "draw" })),
                BetState::Draw,
            )
        } else {
            (
                fields(json!({ "state": "lost", "priceAtResolution": quote.price })),
                // Floor at zero, the user cannot owe points.
                fields(json!({ "score": game.score.saturating_sub(1), "lastResult": "lost" })),
                BetState::Lost,
            )
        };

        if self
            .bets
            .update_bet_and_game(user_id, bet_id, bet_changes, game_changes)
            .await
        {
            info!(
                user_id,
                bet_id,
                outcome = outcome.as_str(),
                reference = bet.price_at_creation,
                resolution = quote.price,
                "bet resolved"
            );
        }
    }

    /// Current quote, passed through for the API layer.
    pub fn current_quote(&self) -> Arc<BtcQuote> {
        self.feed.current_quote()
    }

    fn is_overdue(&self, bet: &Bet) -> bool {
        let elapsed_ms = Utc::now().timestamp_millis() - bet.submitted_at;
        bet.state == BetState::Open
            && elapsed_ms >= self.config.overdue_threshold.as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::models::LastResult;
    use crate::storage::MemoryStore;

    struct Fixture {
        engine: Arc<BetEngine>,
        store: Arc<MemoryStore>,
        bets: BetStore,
        users: UserStore,
        feed: Arc<PriceFeed>,
        user_id: String,
    }

    async fn setup() -> Fixture {
        setup_with_config(EngineConfig::default()).await
    }

    async fn setup_with_config(config: EngineConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let game_store: Arc<dyn GameStore> = store.clone();
        let feed = PriceFeed::fixed(50000.0);
        let engine = BetEngine::new(game_store.clone(), feed.clone(), config);
        let users = UserStore::new(game_store.clone());
        let bets = BetStore::new(game_store);
        let user_id = users.create_user("player").await.unwrap();
        Fixture {
            engine,
            store,
            bets,
            users,
            feed,
            user_id,
        }
    }

    fn quote(price: f64) -> BtcQuote {
        BtcQuote {
            price,
            updated_at: Utc::now(),
        }
    }

    /// Rewrite a bet's submission time so it looks `age` old.
    async fn age_bet(f: &Fixture, bet_id: &str, age: Duration) {
        let submitted_at = Utc::now().timestamp_millis() - age.as_millis() as i64;
        assert!(
            f.bets
                .update_bet(&f.user_id, bet_id, fields(json!({ "submittedAt": submitted_at })))
                .await
        );
    }

    #[tokio::test]
    async fn register_creates_open_bet_and_reports_it_open() {
        let f = setup().await;

        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();

        let bet = f.bets.get_bet(&f.user_id, &bet_id).await.unwrap();
        assert_eq!(bet.state, BetState::Open);
        assert_eq!(bet.price_at_creation, 50000.0);
        assert_eq!(f.users.get_user_game(&f.user_id).await.unwrap().current_bet, bet_id);
        assert!(f.engine.has_open_bet(&f.user_id).await.unwrap());
    }

    #[tokio::test]
    async fn register_surfaces_storage_failure_without_partial_state() {
        let f = setup().await;
        f.store.set_fail_writes(true);

        let result = f.engine.register_bet(&f.user_id, Direction::Up).await;
        assert_eq!(result, Err(GameError::Storage));

        f.store.set_fail_writes(false);
        let game = f.users.get_user_game(&f.user_id).await.unwrap();
        assert_eq!(game.current_bet, "");
        assert!(!f.engine.has_open_bet(&f.user_id).await.unwrap());
    }

    #[tokio::test]
    async fn has_open_bet_false_without_pointer_or_for_unknown_user() {
        let f = setup().await;
        assert!(!f.engine.has_open_bet(&f.user_id).await.unwrap());
        assert_eq!(
            f.engine.has_open_bet("missing-user").await,
            Err(GameError::Storage)
        );
    }

    #[tokio::test]
    async fn has_open_bet_false_when_pointer_is_dangling() {
        let f = setup().await;
        let game_key = crate::game::keys::game(&f.user_id);
        let store: Arc<dyn GameStore> = f.store.clone();
        store
            .update(&game_key, fields(json!({ "currentBet": "no-such-bet" })))
            .await
            .unwrap();

        assert!(!f.engine.has_open_bet(&f.user_id).await.unwrap());
    }

    #[tokio::test]
    async fn won_up_bet_increments_score_and_records_resolution_price() {
        let f = setup().await;
        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();

        f.feed.store_quote(quote(60000.0));
        f.engine.resolve_bet(&f.user_id, &bet_id).await;

        let bet = f.bets.get_bet(&f.user_id, &bet_id).await.unwrap();
        assert_eq!(bet.state, BetState::Won);
        assert_eq!(bet.price_at_resolution, Some(60000.0));

        let game = f.users.get_user_game(&f.user_id).await.unwrap();
        assert_eq!(game.score, 1);
        assert_eq!(game.last_result, LastResult::Won);
        assert!(!f.engine.has_open_bet(&f.user_id).await.unwrap());
    }

    #[tokio::test]
    async fn won_down_bet_when_price_falls() {
        let f = setup().await;
        let bet_id = f.engine.register_bet(&f.user_id, Direction::Down).await.unwrap();

        f.feed.store_quote(quote(40000.0));
        f.engine.resolve_bet(&f.user_id, &bet_id).await;

        assert_eq!(
            f.bets.get_bet(&f.user_id, &bet_id).await.unwrap().state,
            BetState::Won
        );
        assert_eq!(f.users.get_user_game(&f.user_id).await.unwrap().score, 1);
    }

    #[tokio::test]
    async fn lost_bet_decrements_score_with_floor_at_zero() {
        let f = setup().await;

        // Score 0: losing cannot go negative.
        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();
        f.feed.store_quote(quote(40000.0));
        f.engine.resolve_bet(&f.user_id, &bet_id).await;

        let game = f.users.get_user_game(&f.user_id).await.unwrap();
        assert_eq!(game.score, 0);
        assert_eq!(game.last_result, LastResult::Lost);

        // Score 1: the point is taken away.
        let store: Arc<dyn GameStore> = f.store.clone();
        store
            .update(&crate::game::keys::game(&f.user_id), fields(json!({ "score": 1 })))
            .await
            .unwrap();

        f.feed.store_quote(quote(50000.0));
        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();
        f.feed.store_quote(quote(40000.0));
        f.engine.resolve_bet(&f.user_id, &bet_id).await;

        assert_eq!(f.users.get_user_game(&f.user_id).await.unwrap().score, 0);
    }

    #[tokio::test]
    async fn equal_prices_resolve_as_draw_without_score_change() {
        let f = setup().await;
        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();

        // Quote unchanged at 50000.
        f.engine.resolve_bet(&f.user_id, &bet_id).await;

        let bet = f.bets.get_bet(&f.user_id, &bet_id).await.unwrap();
        assert_eq!(bet.state, BetState::Draw);
        assert_eq!(bet.price_at_resolution, Some(50000.0));

        let game = f.users.get_user_game(&f.user_id).await.unwrap();
        assert_eq!(game.score, 0);
        assert_eq!(game.last_result, LastResult::Draw);
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let f = setup().await;
        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();

        f.feed.store_quote(quote(60000.0));
        f.engine.resolve_bet(&f.user_id, &bet_id).await;

        // A late duplicate firing, with the price moved again, changes
        // nothing: exactly one score delta, terminal state stays.
        f.feed.store_quote(quote(30000.0));
        f.engine.resolve_bet(&f.user_id, &bet_id).await;

        let bet = f.bets.get_bet(&f.user_id, &bet_id).await.unwrap();
        assert_eq!(bet.state, BetState::Won);
        assert_eq!(bet.price_at_resolution, Some(60000.0));
        assert_eq!(f.users.get_user_game(&f.user_id).await.unwrap().score, 1);
    }

    #[tokio::test]
    async fn overdue_bet_expires_instead_of_resolving() {
        let f = setup().await;
        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();
        age_bet(&f, &bet_id, Duration::from_secs(91)).await;

        f.feed.store_quote(quote(60000.0));
        f.engine.resolve_bet(&f.user_id, &bet_id).await;

        let bet = f.bets.get_bet(&f.user_id, &bet_id).await.unwrap();
        assert_eq!(bet.state, BetState::Expired);
        assert!(bet.price_at_resolution.is_none());
        assert_eq!(f.users.get_user_game(&f.user_id).await.unwrap().score, 0);
    }

    #[tokio::test]
    async fn get_bet_lazily_expires_and_returns_expired_state() {
        let f = setup().await;
        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();
        age_bet(&f, &bet_id, Duration::from_secs(91)).await;

        let bet = f.engine.get_bet(&f.user_id, &bet_id).await.unwrap();
        assert_eq!(bet.state, BetState::Expired);
        assert!(bet.price_at_resolution.is_none());

        // Persisted too, not just the returned copy.
        assert_eq!(
            f.bets.get_bet(&f.user_id, &bet_id).await.unwrap().state,
            BetState::Expired
        );
    }

    #[tokio::test]
    async fn has_open_bet_expires_overdue_current_bet() {
        let f = setup().await;
        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();
        age_bet(&f, &bet_id, Duration::from_secs(90)).await;

        assert!(!f.engine.has_open_bet(&f.user_id).await.unwrap());
        assert_eq!(
            f.bets.get_bet(&f.user_id, &bet_id).await.unwrap().state,
            BetState::Expired
        );
    }

    #[tokio::test]
    async fn just_under_threshold_is_not_overdue() {
        let f = setup().await;
        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();
        age_bet(&f, &bet_id, Duration::from_secs(61)).await;

        // 61s old: past the resolution window but inside the grace period.
        assert!(f.engine.has_open_bet(&f.user_id).await.unwrap());
        assert_eq!(
            f.bets.get_bet(&f.user_id, &bet_id).await.unwrap().state,
            BetState::Open
        );
    }

    #[tokio::test]
    async fn terminal_states_are_final_even_when_ancient() {
        let f = setup().await;
        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();

        f.feed.store_quote(quote(60000.0));
        f.engine.resolve_bet(&f.user_id, &bet_id).await;
        age_bet(&f, &bet_id, Duration::from_secs(3600)).await;

        // Overdue only applies to open bets; a won bet stays won.
        let bet = f.engine.get_bet(&f.user_id, &bet_id).await.unwrap();
        assert_eq!(bet.state, BetState::Won);
    }

    #[tokio::test]
    async fn resolve_missing_records_is_a_logged_noop() {
        let f = setup().await;
        // Nothing to repair, nothing to panic about.
        f.engine.resolve_bet(&f.user_id, "no-such-bet").await;
        f.engine.resolve_bet("no-such-user", "no-such-bet").await;
        assert_eq!(f.users.get_user_game(&f.user_id).await.unwrap().score, 0);
    }

    #[tokio::test]
    async fn scheduled_resolution_fires_after_the_window() {
        let f = setup_with_config(EngineConfig {
            resolution_window: Duration::from_millis(50),
            overdue_threshold: Duration::from_secs(10),
        })
        .await;

        let bet_id = f.engine.register_bet(&f.user_id, Direction::Up).await.unwrap();
        f.feed.store_quote(quote(60000.0));

        tokio::time::sleep(Duration::from_millis(200)).await;

        let bet = f.bets.get_bet(&f.user_id, &bet_id).await.unwrap();
        assert_eq!(bet.state, BetState::Won);
        assert_eq!(f.users.get_user_game(&f.user_id).await.unwrap().score, 1);
    }
}
