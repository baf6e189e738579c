//! Live price source implementations

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::types::Asset;

/// Trait for upstream price providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Get the source name
    fn name(&self) -> &'static str;

    /// Fetch a spot quote for each requested asset
    async fn fetch(&self, assets: &[Asset]) -> Result<HashMap<Asset, Decimal>>;
}

/// Source serving quotes set programmatically, for offline runs.
/// Assets without a set quote fall back to their seed price. Clones share
/// the same quote table.
#[derive(Clone, Default)]
pub struct FixedPriceSource {
    quotes: Arc<RwLock<HashMap<Asset, Decimal>>>,
}

impl FixedPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, asset: Asset, price: Decimal) {
        self.quotes.write().unwrap().insert(asset, price);
    }
}

#[async_trait]
impl PriceSource for FixedPriceSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn fetch(&self, assets: &[Asset]) -> Result<HashMap<Asset, Decimal>> {
        let quotes = self.quotes.read().unwrap();
        Ok(assets
            .iter()
            .map(|a| (*a, quotes.get(a).copied().unwrap_or_else(|| a.seed_price())))
            .collect())
    }
}

/// CoinGecko simple-price client
pub struct HttpPriceSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPriceSource {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.coingecko.com/api/v3";

    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| EngineError::FeedUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch(&self, assets: &[Asset]) -> Result<HashMap<Asset, Decimal>> {
        let ids: Vec<&str> = assets.iter().map(|a| a.coingecko_id()).collect();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url,
            ids.join(",")
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::FeedUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| EngineError::FeedUnavailable(e.to_string()))?;

        let body: HashMap<String, HashMap<String, f64>> = response
            .json()
            .await
            .map_err(|e| EngineError::FeedUnavailable(e.to_string()))?;

        let mut prices = HashMap::new();
        for asset in assets {
            let quote = body
                .get(asset.coingecko_id())
                .and_then(|m| m.get("usd"))
                .copied()
                .ok_or_else(|| {
                    EngineError::FeedUnavailable(format!("no usd quote for {asset}"))
                })?;
            let price = Decimal::from_f64(quote).ok_or_else(|| {
                EngineError::FeedUnavailable(format!("unrepresentable quote for {asset}"))
            })?;
            prices.insert(*asset, price);
        }
        Ok(prices)
    }
}
