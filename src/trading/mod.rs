//! Trade execution engine
//!
//! Validates and settles simulated buy/sell orders against the SHM balance
//! and the ledger-derived holdings. The price is always snapshotted from the
//! feed; callers never supply one. An order either settles fully at that
//! price or is rejected with zero mutation.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::accounts::{update_with_retry, AccountLocks};
use crate::error::{EngineError, Result};
use crate::portfolio::{self, PortfolioSnapshot};
use crate::pricefeed::PriceFeed;
use crate::store::LedgerStore;
use crate::types::{Asset, Trade, TradeSide, TradeStatus};

pub struct TradeEngine {
    store: Arc<dyn LedgerStore>,
    feed: Arc<PriceFeed>,
    locks: Arc<AccountLocks>,
    max_retries: u32,
}

impl TradeEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        feed: Arc<PriceFeed>,
        locks: Arc<AccountLocks>,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            feed,
            locks,
            max_retries,
        }
    }

    /// Execute a buy or sell for an account.
    ///
    /// BUY requires `amount * price` within the current balance; SELL
    /// requires `amount` within the current derived holdings. Either check
    /// failing rejects the order before any write. A repeated `client_ref`
    /// returns the already-settled trade instead of applying it twice.
    pub async fn execute(
        &self,
        address: &str,
        asset: Asset,
        side: TradeSide,
        amount: Decimal,
        client_ref: Option<&str>,
    ) -> Result<Trade> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "trade amount must be positive, got {amount}"
            )));
        }

        // Account must exist before anything is written.
        self.store.get_account(address).await?;

        let lock = self.locks.for_address(address);
        let _guard = lock.lock().await;

        if let Some(r) = client_ref {
            let existing = self
                .store
                .list_trades(address)
                .await?
                .into_iter()
                .find(|t| t.client_ref.as_deref() == Some(r));
            if let Some(t) = existing {
                debug!(address, client_ref = r, "trade retry matched existing record");
                return Ok(t);
            }
        }

        let price = self.feed.current_price(asset);
        let total_cost = amount * price;

        // SELL is bounded by the ledger-derived holdings, recomputed fresh.
        if side == TradeSide::Sell {
            let trades = self.store.list_trades(address).await?;
            let held = portfolio::asset_holdings(&trades, asset);
            if amount > held {
                return Err(EngineError::InsufficientHoldings {
                    asset,
                    needed: amount,
                    available: held,
                });
            }
        }

        // Balance moves first as one versioned write; the funds check runs
        // inside it against fresh state. The append follows, and a failed
        // append reverses the balance.
        update_with_retry(self.store.as_ref(), address, self.max_retries, |acc| {
            match side {
                TradeSide::Buy => {
                    if total_cost > acc.balance {
                        return Err(EngineError::InsufficientFunds {
                            needed: total_cost,
                            available: acc.balance,
                        });
                    }
                    acc.balance -= total_cost;
                }
                TradeSide::Sell => acc.balance += total_cost,
            }
            Ok(())
        })
        .await?;

        let trade = Trade {
            id: uuid::Uuid::new_v4().to_string(),
            account: address.to_string(),
            asset,
            side,
            amount,
            price,
            total_cost,
            status: TradeStatus::Completed,
            client_ref: client_ref.map(str::to_string),
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.append_trade(&trade).await {
            warn!(address, error = %e, "trade append failed, reversing balance");
            let undo = update_with_retry(self.store.as_ref(), address, self.max_retries, |acc| {
                match side {
                    TradeSide::Buy => acc.balance += total_cost,
                    TradeSide::Sell => acc.balance -= total_cost,
                }
                Ok(())
            })
            .await;
            if let Err(undo_err) = undo {
                error!(address, error = %undo_err, "balance reversal failed");
            }
            return Err(e);
        }

        info!(
            address,
            asset = %asset,
            side = %side,
            amount = %amount,
            price = %price,
            total_cost = %total_cost,
            "trade executed"
        );
        Ok(trade)
    }

    /// Derived portfolio for an account at current quotes
    pub async fn portfolio(&self, address: &str) -> Result<PortfolioSnapshot> {
        let trades = self.store.list_trades(address).await?;
        let quotes = Asset::ALL
            .iter()
            .map(|a| (*a, self.feed.current_price(*a)))
            .collect();
        Ok(portfolio::snapshot(&trades, &quotes))
    }

    /// Newest-first trade history for an account
    pub async fn history(&self, address: &str) -> Result<Vec<Trade>> {
        self.store.list_trades(address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PriceFeedConfig;
    use crate::pricefeed::FixedPriceSource;
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn feed_with_source() -> (Arc<PriceFeed>, FixedPriceSource) {
        let source = FixedPriceSource::default();
        let config = PriceFeedConfig {
            refresh_secs: 30,
            history_window: 100,
            fallback_jitter_pct: 0.02,
            request_timeout_ms: 1000,
        };
        let feed = Arc::new(PriceFeed::new(Box::new(source.clone()), &config));
        (feed, source)
    }

    struct Setup {
        engine: TradeEngine,
        store: Arc<MemoryStore>,
        feed: Arc<PriceFeed>,
        source: FixedPriceSource,
    }

    async fn engine_with_balance(balance: Decimal) -> Setup {
        let store = Arc::new(MemoryStore::new(balance));
        store.create_account("0xabc").await.unwrap();
        let (feed, source) = feed_with_source();
        let engine = TradeEngine::new(store.clone(), feed.clone(), Arc::new(AccountLocks::new()), 3);
        Setup {
            engine,
            store,
            feed,
            source,
        }
    }

    #[tokio::test]
    async fn buy_then_partial_sell_matches_worked_example() {
        let s = engine_with_balance(dec!(100)).await;

        s.source.set(Asset::BTC, dec!(40000));
        s.feed.refresh().await;
        let buy = s
            .engine
            .execute("0xabc", Asset::BTC, TradeSide::Buy, dec!(0.001), None)
            .await
            .unwrap();
        assert_eq!(buy.total_cost, dec!(40));
        assert_eq!(s.store.get_account("0xabc").await.unwrap().balance, dec!(60));

        s.source.set(Asset::BTC, dec!(42000));
        s.feed.refresh().await;
        let sell = s
            .engine
            .execute("0xabc", Asset::BTC, TradeSide::Sell, dec!(0.0005), None)
            .await
            .unwrap();
        assert_eq!(sell.total_cost, dec!(21));
        assert_eq!(s.store.get_account("0xabc").await.unwrap().balance, dec!(81));

        let snapshot = s.engine.portfolio("0xabc").await.unwrap();
        assert_eq!(snapshot.holdings[&Asset::BTC], dec!(0.0005));
    }

    #[tokio::test]
    async fn buy_beyond_balance_is_rejected_without_mutation() {
        let s = engine_with_balance(dec!(10)).await;

        s.source.set(Asset::BTC, dec!(50000));
        s.feed.refresh().await;
        let err = s
            .engine
            .execute("0xabc", Asset::BTC, TradeSide::Buy, dec!(0.001), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));

        assert_eq!(s.store.get_account("0xabc").await.unwrap().balance, dec!(10));
        assert!(s.store.list_trades("0xabc").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sell_beyond_holdings_is_rejected_without_mutation() {
        let s = engine_with_balance(dec!(100)).await;

        s.source.set(Asset::ETH, dec!(2600));
        s.feed.refresh().await;
        let err = s
            .engine
            .execute("0xabc", Asset::ETH, TradeSide::Sell, dec!(0.01), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientHoldings { .. }));

        assert_eq!(s.store.get_account("0xabc").await.unwrap().balance, dec!(100));
        assert!(s.store.list_trades("0xabc").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected() {
        let s = engine_with_balance(dec!(100)).await;
        for amount in [dec!(0), dec!(-1)] {
            let err = s
                .engine
                .execute("0xabc", Asset::BTC, TradeSide::Buy, amount, None)
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn unknown_account_is_rejected() {
        let s = engine_with_balance(dec!(100)).await;
        let err = s
            .engine
            .execute("0xnobody", Asset::BTC, TradeSide::Buy, dec!(0.001), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn retry_with_same_client_ref_settles_once() {
        let s = engine_with_balance(dec!(100)).await;

        s.source.set(Asset::BTC, dec!(40000));
        s.feed.refresh().await;

        let first = s
            .engine
            .execute("0xabc", Asset::BTC, TradeSide::Buy, dec!(0.001), Some("tx-1"))
            .await
            .unwrap();
        let second = s
            .engine
            .execute("0xabc", Asset::BTC, TradeSide::Buy, dec!(0.001), Some("tx-1"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(s.store.get_account("0xabc").await.unwrap().balance, dec!(60));
        assert_eq!(s.store.list_trades("0xabc").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exact_balance_spend_is_allowed() {
        let s = engine_with_balance(dec!(40)).await;

        s.source.set(Asset::BTC, dec!(40000));
        s.feed.refresh().await;
        s.engine
            .execute("0xabc", Asset::BTC, TradeSide::Buy, dec!(0.001), None)
            .await
            .unwrap();

        assert_eq!(
            s.store.get_account("0xabc").await.unwrap().balance,
            Decimal::ZERO
        );
    }
}
