//! Engine service binary
//!
//! Wires the in-process store, the live price feed and both engines
//! together, then runs the background loops (price refresh, resolution
//! sweep, status log) until ctrl-c.

use anyhow::{Context, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shm_engine::accounts::{AccountLocks, AccountManager};
use shm_engine::config::AppConfig;
use shm_engine::predictions::{
    OutcomeOracle, PredictionEngine, PriceComparisonOracle, RandomOracle, ResolutionSweeper,
};
use shm_engine::pricefeed::{HttpPriceSource, PriceFeed};
use shm_engine::store::MemoryStore;
use shm_engine::trading::TradeEngine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    info!(config = %config.digest(), "🚀 engine starting");

    let starting_bonus = Decimal::from_f64(config.engine.starting_bonus)
        .context("starting bonus is not representable")?;
    let store = Arc::new(MemoryStore::new(starting_bonus));

    let source = HttpPriceSource::new(config.pricefeed.request_timeout_ms)?;
    let feed = Arc::new(PriceFeed::new(Box::new(source), &config.pricefeed));
    feed.refresh().await;

    let locks = Arc::new(AccountLocks::new());

    let oracle: Arc<dyn OutcomeOracle> = match config.prediction.oracle.as_str() {
        "price" => Arc::new(PriceComparisonOracle::new(feed.clone())),
        _ => Arc::new(RandomOracle::new(config.prediction.win_probability)),
    };
    info!(oracle = oracle.name(), "outcome oracle selected");

    let accounts = Arc::new(AccountManager::new(store.clone()));
    let predictions = Arc::new(PredictionEngine::new(
        store.clone(),
        feed.clone(),
        oracle,
        locks.clone(),
        config.prediction.clone(),
        config.engine.max_update_retries,
    ));
    let trading = Arc::new(TradeEngine::new(
        store,
        feed.clone(),
        locks,
        config.engine.max_update_retries,
    ));

    // Demo wallet so the status loop has something to report.
    let wallet = std::env::var("SHM_WALLET").unwrap_or_else(|_| "0xdemo".to_string());
    let account = accounts.connect(&wallet).await?;
    info!(address = %account.address, balance = %account.balance, "account ready");

    // Price refresh loop
    let refresh_feed = feed.clone();
    let refresh_secs = config.pricefeed.refresh_secs;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(refresh_secs));
        loop {
            ticker.tick().await;
            refresh_feed.refresh().await;
        }
    });

    ResolutionSweeper::new(predictions.clone()).spawn();

    // Status loop: account stats and ledger-derived portfolio
    let status_accounts = accounts.clone();
    let status_trading = trading.clone();
    let status_wallet = wallet.clone();
    let status_secs = config.prediction.sweep_interval_secs;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(status_secs));
        loop {
            ticker.tick().await;
            let account = match status_accounts.account(&status_wallet).await {
                Ok(a) => a,
                Err(_) => continue,
            };
            if let Ok(snapshot) = status_trading.portfolio(&status_wallet).await {
                info!(
                    address = %account.address,
                    balance = %account.balance,
                    streak = account.streak,
                    accuracy_pct = account.accuracy_pct(),
                    portfolio_value = %snapshot.portfolio_value,
                    pnl = %snapshot.pnl,
                    "status"
                );
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
