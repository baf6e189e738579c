//! Price feed adapter
//!
//! Caches the latest quote per asset and a bounded rolling history. A failed
//! upstream fetch degrades to a synthetically perturbed last-known quote so
//! callers are never blocked on the network.

mod sources;

pub use sources::{FixedPriceSource, HttpPriceSource, PriceSource};

#[cfg(test)]
pub use sources::MockPriceSource;

use chrono::Utc;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::config::PriceFeedConfig;
use crate::types::{Asset, PriceSample};

pub struct PriceFeed {
    source: Box<dyn PriceSource>,
    /// Last-known quote per asset, seeded so a quote is always available
    prices: RwLock<HashMap<Asset, Decimal>>,
    /// Rolling history, oldest samples dropped past the window
    history: RwLock<VecDeque<PriceSample>>,
    window: usize,
    jitter_pct: f64,
}

impl PriceFeed {
    pub fn new(source: Box<dyn PriceSource>, config: &PriceFeedConfig) -> Self {
        let seeded: HashMap<Asset, Decimal> =
            Asset::ALL.iter().map(|a| (*a, a.seed_price())).collect();
        Self {
            source,
            prices: RwLock::new(seeded),
            history: RwLock::new(VecDeque::new()),
            window: config.history_window,
            jitter_pct: config.fallback_jitter_pct,
        }
    }

    /// Pull fresh quotes from the source, falling back to perturbed
    /// last-known quotes when it is unavailable. Always records a history
    /// sample.
    pub async fn refresh(&self) {
        match self.source.fetch(&Asset::ALL).await {
            Ok(quotes) => {
                self.prices.write().unwrap().extend(quotes.iter());
                debug!(source = self.source.name(), "price feed refreshed");
            }
            Err(e) => {
                let fallback = self.perturbed_fallback();
                self.prices.write().unwrap().extend(fallback.iter());
                warn!(
                    source = self.source.name(),
                    error = %e,
                    "price fetch failed, using perturbed last-known quotes"
                );
            }
        }
        self.record_sample();
    }

    /// Latest quote for an asset. Non-blocking read of cached state.
    pub fn current_price(&self, asset: Asset) -> Decimal {
        self.prices
            .read()
            .unwrap()
            .get(&asset)
            .copied()
            .unwrap_or_else(|| asset.seed_price())
    }

    /// Rolling history, oldest first
    pub fn recent_history(&self) -> Vec<PriceSample> {
        self.history.read().unwrap().iter().cloned().collect()
    }

    fn record_sample(&self) {
        let sample = PriceSample {
            ts: Utc::now(),
            prices: self.prices.read().unwrap().clone(),
        };
        let mut history = self.history.write().unwrap();
        history.push_back(sample);
        while history.len() > self.window {
            history.pop_front();
        }
    }

    /// Random-walk each last-known quote within the configured jitter,
    /// clamped to the per-asset floor.
    fn perturbed_fallback(&self) -> HashMap<Asset, Decimal> {
        let mut rng = rand::thread_rng();
        let prices = self.prices.read().unwrap();
        prices
            .iter()
            .map(|(asset, last)| {
                let jitter = (rng.gen::<f64>() - 0.5) * 2.0 * self.jitter_pct;
                let factor = Decimal::from_f64(1.0 + jitter).unwrap_or(Decimal::ONE);
                (*asset, (*last * factor).max(asset.floor_price()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use rust_decimal_macros::dec;

    fn test_config(window: usize) -> PriceFeedConfig {
        PriceFeedConfig {
            refresh_secs: 30,
            history_window: window,
            fallback_jitter_pct: 0.02,
            request_timeout_ms: 1000,
        }
    }

    fn quotes(btc: Decimal, eth: Decimal) -> HashMap<Asset, Decimal> {
        HashMap::from([(Asset::BTC, btc), (Asset::ETH, eth)])
    }

    #[tokio::test]
    async fn refresh_updates_quotes_and_history() {
        let mut source = MockPriceSource::new();
        source.expect_name().return_const("mock");
        source
            .expect_fetch()
            .returning(|_| Ok(quotes(dec!(40000), dec!(2500))));

        let feed = PriceFeed::new(Box::new(source), &test_config(100));
        feed.refresh().await;

        assert_eq!(feed.current_price(Asset::BTC), dec!(40000));
        assert_eq!(feed.current_price(Asset::ETH), dec!(2500));
        assert_eq!(feed.recent_history().len(), 1);
    }

    #[tokio::test]
    async fn source_failure_degrades_to_perturbed_quote() {
        let mut source = MockPriceSource::new();
        source.expect_name().return_const("mock");
        source
            .expect_fetch()
            .returning(|_| Err(EngineError::FeedUnavailable("down".to_string())));

        let feed = PriceFeed::new(Box::new(source), &test_config(100));
        feed.refresh().await;

        // Still quoting, within the 2% jitter band around the seed and never
        // below the floor.
        let btc = feed.current_price(Asset::BTC);
        let seed = Asset::BTC.seed_price();
        assert!(btc >= seed * dec!(0.97) && btc <= seed * dec!(1.03));
        assert!(btc >= Asset::BTC.floor_price());
        assert_eq!(feed.recent_history().len(), 1);
    }

    #[tokio::test]
    async fn history_is_bounded_by_window() {
        let mut source = MockPriceSource::new();
        source.expect_name().return_const("mock");
        source
            .expect_fetch()
            .returning(|_| Ok(quotes(dec!(40000), dec!(2500))));

        let feed = PriceFeed::new(Box::new(source), &test_config(3));
        for _ in 0..5 {
            feed.refresh().await;
        }
        assert_eq!(feed.recent_history().len(), 3);
    }
}
