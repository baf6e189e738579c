//! Outcome oracles
//!
//! The lifecycle manager only ever consumes a boolean verdict; the policy
//! that produces it lives behind [`OutcomeOracle`] so the simulated oracle
//! can be swapped for a real evaluator without touching the manager.

use rand::Rng;
use std::sync::Arc;

use crate::pricefeed::PriceFeed;
use crate::types::{Direction, Prediction};

pub trait OutcomeOracle: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decide whether a prediction won
    fn judge(&self, prediction: &Prediction) -> bool;
}

/// Simulated oracle with a fixed win probability
pub struct RandomOracle {
    win_probability: f64,
}

impl RandomOracle {
    pub fn new(win_probability: f64) -> Self {
        Self {
            win_probability: win_probability.clamp(0.0, 1.0),
        }
    }
}

impl OutcomeOracle for RandomOracle {
    fn name(&self) -> &'static str {
        "random"
    }

    fn judge(&self, _prediction: &Prediction) -> bool {
        rand::thread_rng().gen::<f64>() < self.win_probability
    }
}

/// Judges against the live feed: UP wins when the current quote is above the
/// entry snapshot, DOWN when below.
pub struct PriceComparisonOracle {
    feed: Arc<PriceFeed>,
}

impl PriceComparisonOracle {
    pub fn new(feed: Arc<PriceFeed>) -> Self {
        Self { feed }
    }
}

impl OutcomeOracle for PriceComparisonOracle {
    fn name(&self) -> &'static str {
        "price"
    }

    fn judge(&self, prediction: &Prediction) -> bool {
        let current = self.feed.current_price(prediction.asset);
        match prediction.direction {
            Direction::Up => current > prediction.entry_price,
            Direction::Down => current < prediction.entry_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PriceFeedConfig;
    use crate::pricefeed::FixedPriceSource;
    use crate::types::{Asset, PredictionStatus, Timeframe};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn prediction(direction: Direction) -> Prediction {
        Prediction {
            id: "p1".to_string(),
            account: "0xabc".to_string(),
            asset: Asset::BTC,
            direction,
            confidence: 70,
            entry_price: dec!(40000),
            timeframe: Timeframe::Hour1,
            status: PredictionStatus::Pending,
            reward_tokens: 12,
            request_ref: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    fn feed_at(btc: rust_decimal::Decimal) -> Arc<PriceFeed> {
        let source = FixedPriceSource::default();
        source.set(Asset::BTC, btc);
        let config = PriceFeedConfig {
            refresh_secs: 30,
            history_window: 100,
            fallback_jitter_pct: 0.02,
            request_timeout_ms: 1000,
        };
        let feed = PriceFeed::new(Box::new(source), &config);
        Arc::new(feed)
    }

    #[test]
    fn random_oracle_respects_probability_bounds() {
        let always = RandomOracle::new(1.0);
        let never = RandomOracle::new(0.0);
        let p = prediction(Direction::Up);
        for _ in 0..20 {
            assert!(always.judge(&p));
            assert!(!never.judge(&p));
        }
    }

    #[tokio::test]
    async fn price_oracle_compares_entry_to_current() {
        let feed = feed_at(dec!(41000));
        feed.refresh().await;
        let oracle = PriceComparisonOracle::new(feed);

        assert!(oracle.judge(&prediction(Direction::Up)));
        assert!(!oracle.judge(&prediction(Direction::Down)));
    }
}
