//! BTC price feed
//!
//! Polls a CoinDesk-shaped endpoint on a fixed interval and keeps the last
//! successful quote behind an `ArcSwap`, so readers are lock-free and never
//! see a half-written value. A failed fetch keeps the previous quote and the
//! loop reschedules unconditionally; readers never block on the upstream.

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The latest known BTC price and the upstream's own "as of" timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct BtcQuote {
    pub price: f64,
    pub updated_at: DateTime<Utc>,
}

/// Response shape of the CoinDesk current-price endpoint. Fields we do not
/// consume are ignored by serde.
#[derive(Debug, Deserialize)]
struct CoinDeskResponse {
    time: CoinDeskTime,
    bpi: CoinDeskBpi,
}

#[derive(Debug, Deserialize)]
struct CoinDeskTime {
    #[serde(rename = "updatedISO")]
    updated_iso: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CoinDeskBpi {
    #[serde(rename = "USD")]
    usd: CoinDeskUsd,
}

#[derive(Debug, Deserialize)]
struct CoinDeskUsd {
    rate_float: f64,
}

pub struct PriceFeed {
    client: Client,
    endpoint: String,
    current: ArcSwap<BtcQuote>,
}

impl PriceFeed {
    pub fn new(endpoint: String, fetch_timeout: Duration) -> Result<Arc<Self>> {
        let client = Client::builder()
            .timeout(fetch_timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Arc::new(Self {
            client,
            endpoint,
            // Zero sentinel until the first successful fetch.
            current: ArcSwap::from_pointee(BtcQuote {
                price: 0.0,
                updated_at: Utc::now(),
            }),
        }))
    }

    /// Feed with a fixed quote and no upstream. Tests and offline runs.
    pub fn fixed(price: f64) -> Arc<Self> {
        let feed = Self::new(String::new(), Duration::from_secs(1))
            .expect("default client config is valid");
        feed.store_quote(BtcQuote {
            price,
            updated_at: Utc::now(),
        });
        feed
    }

    /// Current quote snapshot. Never blocks, never fails.
    pub fn current_quote(&self) -> Arc<BtcQuote> {
        self.current.load_full()
    }

    /// Replace the quote wholesale. The poll loop is the usual writer; tests
    /// drive outcomes by storing quotes directly.
    pub fn store_quote(&self, quote: BtcQuote) {
        self.current.store(Arc::new(quote));
    }

    async fn fetch_once(&self) -> Result<()> {
        let response: CoinDeskResponse = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .context("price request failed")?
            .json()
            .await
            .context("failed to parse price response")?;

        // Round to cents at ingest so equality comparisons downstream work
        // on the value users see.
        let price = (response.bpi.usd.rate_float * 100.0).round() / 100.0;

        self.store_quote(BtcQuote {
            price,
            updated_at: response.time.updated_iso,
        });
        debug!(price, "updated BTC quote");
        Ok(())
    }

    /// Spawn the background refresh task. Fire-and-continue: failures are
    /// logged, the previous quote is retained, and the loop always
    /// reschedules.
    pub fn spawn_poller(self: &Arc<Self>, poll_interval: Duration) {
        let feed = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = feed.fetch_once().await {
                    warn!(error = %e, "failed to fetch updated BTC price");
                }
                tokio::time::sleep(poll_interval).await;
            }
        });
    }
}
