//! Configuration management
//!
//! Loads from optional config files + environment variables via .env

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub prediction: PredictionConfig,
    pub pricefeed: PriceFeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// SHM tokens credited when a wallet first connects
    pub starting_bonus: f64,
    /// Bound on optimistic-update retries before surfacing a conflict
    pub max_update_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    /// Lowest accepted confidence percentage
    pub confidence_min: u8,
    /// Highest accepted confidence percentage
    pub confidence_max: u8,
    /// Minimum age in seconds before a pending prediction is swept
    pub maturity_secs: u64,
    /// Resolution sweep cadence in seconds
    pub sweep_interval_secs: u64,
    /// Outcome oracle selection: "random" or "price"
    pub oracle: String,
    /// Win probability for the random oracle
    pub win_probability: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceFeedConfig {
    /// Feed refresh cadence in seconds
    pub refresh_secs: u64,
    /// Rolling history length; oldest samples drop past this
    pub history_window: usize,
    /// Max relative jitter applied to fallback quotes when the source fails
    pub fallback_jitter_pct: f64,
    /// HTTP request timeout for the live source
    pub request_timeout_ms: u64,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Engine defaults
            .set_default("engine.starting_bonus", 100.0)?
            .set_default("engine.max_update_retries", 3)?
            // Prediction defaults — six-minute maturity, 30s sweep, 60% demo win rate
            .set_default("prediction.confidence_min", 50)?
            .set_default("prediction.confidence_max", 100)?
            .set_default("prediction.maturity_secs", 360)?
            .set_default("prediction.sweep_interval_secs", 30)?
            .set_default("prediction.oracle", "random")?
            .set_default("prediction.win_probability", 0.6)?
            // Price feed defaults
            .set_default("pricefeed.refresh_secs", 30)?
            .set_default("pricefeed.history_window", 100)?
            .set_default("pricefeed.fallback_jitter_pct", 0.02)?
            .set_default("pricefeed.request_timeout_ms", 5000)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (SHM_*)
            .add_source(Environment::with_prefix("SHM").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Generate a digest of the config for startup logging
    pub fn digest(&self) -> String {
        format!(
            "bonus={} maturity={}s sweep={}s oracle={} feed_refresh={}s",
            self.engine.starting_bonus,
            self.prediction.maturity_secs,
            self.prediction.sweep_interval_secs,
            self.prediction.oracle,
            self.pricefeed.refresh_secs
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_files() {
        let cfg = AppConfig::load().expect("defaults should load");
        assert_eq!(cfg.engine.starting_bonus, 100.0);
        assert_eq!(cfg.prediction.confidence_min, 50);
        assert_eq!(cfg.prediction.confidence_max, 100);
        assert_eq!(cfg.pricefeed.history_window, 100);
    }
}
