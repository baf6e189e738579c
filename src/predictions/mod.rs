//! Prediction lifecycle
//!
//! Creates directional predictions, resolves them exactly once, and keeps
//! the account's reward/streak/accuracy bookkeeping consistent with the
//! prediction ledger.

mod oracle;
mod sweeper;

pub use oracle::{OutcomeOracle, PriceComparisonOracle, RandomOracle};
pub use sweeper::ResolutionSweeper;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::accounts::{update_with_retry, AccountLocks};
use crate::config::PredictionConfig;
use crate::error::{EngineError, Result};
use crate::pricefeed::PriceFeed;
use crate::store::{LedgerStore, ResolutionPatch};
use crate::types::{
    Asset, Direction, Prediction, PredictionStatus, Timeframe, UserAccount,
};

/// Reward tokens for a confidence percentage: 10-15 over the 50-100 range
pub fn reward_for_confidence(confidence: u8) -> u32 {
    u32::from(confidence / 10) + 5
}

pub struct PredictionEngine {
    store: Arc<dyn LedgerStore>,
    feed: Arc<PriceFeed>,
    oracle: Arc<dyn OutcomeOracle>,
    locks: Arc<AccountLocks>,
    config: PredictionConfig,
    max_retries: u32,
}

impl PredictionEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        feed: Arc<PriceFeed>,
        oracle: Arc<dyn OutcomeOracle>,
        locks: Arc<AccountLocks>,
        config: PredictionConfig,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            feed,
            oracle,
            locks,
            config,
            max_retries,
        }
    }

    /// Create a PENDING prediction and bump the account's total counter.
    ///
    /// Validates everything before the first write: an absent account or an
    /// out-of-range confidence mutates nothing. A repeated `request_ref`
    /// returns the already-recorded prediction instead of double-appending.
    pub async fn create(
        &self,
        address: &str,
        asset: Asset,
        direction: Direction,
        confidence: u8,
        timeframe: Timeframe,
        request_ref: Option<&str>,
    ) -> Result<Prediction> {
        if confidence < self.config.confidence_min || confidence > self.config.confidence_max {
            return Err(EngineError::Validation(format!(
                "confidence {confidence} outside {}-{}",
                self.config.confidence_min, self.config.confidence_max
            )));
        }

        // Account must exist before anything is written.
        self.store.get_account(address).await?;

        let lock = self.locks.for_address(address);
        let _guard = lock.lock().await;

        if let Some(r) = request_ref {
            let existing = self
                .store
                .list_predictions(address)
                .await?
                .into_iter()
                .find(|p| p.request_ref.as_deref() == Some(r));
            if let Some(p) = existing {
                debug!(address, request_ref = r, "prediction retry matched existing record");
                return Ok(p);
            }
        }

        let entry_price = self.feed.current_price(asset);
        let prediction = Prediction {
            id: uuid::Uuid::new_v4().to_string(),
            account: address.to_string(),
            asset,
            direction,
            confidence,
            entry_price,
            timeframe,
            status: PredictionStatus::Pending,
            reward_tokens: reward_for_confidence(confidence),
            request_ref: request_ref.map(str::to_string),
            created_at: Utc::now(),
            resolved_at: None,
        };

        // Counter first, append second; a failed append undoes the counter.
        update_with_retry(self.store.as_ref(), address, self.max_retries, |acc| {
            acc.total_predictions += 1;
            Ok(())
        })
        .await?;

        if let Err(e) = self.store.append_prediction(&prediction).await {
            warn!(address, error = %e, "prediction append failed, reverting counter");
            let undo =
                update_with_retry(self.store.as_ref(), address, self.max_retries, |acc| {
                    acc.total_predictions = acc.total_predictions.saturating_sub(1);
                    Ok(())
                })
                .await;
            if let Err(undo_err) = undo {
                error!(address, error = %undo_err, "counter revert failed");
            }
            return Err(e);
        }

        info!(
            address,
            asset = %asset,
            direction = %direction,
            confidence,
            entry_price = %entry_price,
            reward = prediction.reward_tokens,
            "prediction created"
        );
        Ok(prediction)
    }

    /// Resolve a pending prediction to WON or LOST.
    ///
    /// The account bookkeeping is applied first as one versioned write, then
    /// the store settles the PENDING -> terminal transition exactly once. If
    /// that transition loses a race (or the store fails) the bookkeeping is
    /// restored, so a WON record without credited tokens cannot exist.
    /// Resolving an already-terminal prediction changes nothing and reports
    /// `AlreadyResolved`.
    pub async fn resolve(&self, prediction_id: &str, won: bool) -> Result<Prediction> {
        let prediction = self.store.get_prediction(prediction_id).await?;
        if prediction.status.is_terminal() {
            return Err(EngineError::AlreadyResolved(prediction_id.to_string()));
        }

        let lock = self.locks.for_address(&prediction.account);
        let _guard = lock.lock().await;

        // Re-check under the lock; a concurrent resolver may have settled it.
        let prediction = self.store.get_prediction(prediction_id).await?;
        if prediction.status.is_terminal() {
            return Err(EngineError::AlreadyResolved(prediction_id.to_string()));
        }

        let snapshot = self.store.get_account(&prediction.account).await?;
        let reward = prediction.reward_tokens;

        update_with_retry(
            self.store.as_ref(),
            &prediction.account,
            self.max_retries,
            |acc| {
                apply_outcome(acc, reward, won);
                Ok(())
            },
        )
        .await?;

        let patch = ResolutionPatch {
            status: if won {
                PredictionStatus::Won
            } else {
                PredictionStatus::Lost
            },
            resolved_at: Utc::now(),
        };

        match self.store.update_prediction(prediction_id, patch).await {
            Ok(resolved) => {
                info!(
                    prediction = prediction_id,
                    account = %prediction.account,
                    outcome = %resolved.status,
                    reward = if won { reward } else { 0 },
                    "prediction resolved"
                );
                Ok(resolved)
            }
            Err(e) => {
                warn!(
                    prediction = prediction_id,
                    error = %e,
                    "resolution transition refused, restoring account bookkeeping"
                );
                let undo = update_with_retry(
                    self.store.as_ref(),
                    &prediction.account,
                    self.max_retries,
                    |acc| {
                        restore_stats(acc, &snapshot);
                        Ok(())
                    },
                )
                .await;
                if let Err(undo_err) = undo {
                    error!(
                        prediction = prediction_id,
                        error = %undo_err,
                        "bookkeeping restore failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Resolve every pending prediction older than the maturity threshold,
    /// judging each through the configured oracle. Each record is handled
    /// independently; one failure never blocks the rest.
    pub async fn resolve_mature(&self) -> Result<usize> {
        let maturity = Duration::seconds(self.config.maturity_secs as i64);
        let now = Utc::now();

        let pending = self.store.list_pending_predictions().await?;
        let mut resolved = 0;
        for prediction in pending {
            if now - prediction.created_at < maturity {
                continue;
            }
            let won = self.oracle.judge(&prediction);
            match self.resolve(&prediction.id, won).await {
                Ok(_) => resolved += 1,
                // Another resolver got there first; nothing to do.
                Err(EngineError::AlreadyResolved(_)) => {}
                Err(e) => {
                    warn!(prediction = %prediction.id, error = %e, "sweep resolution failed");
                }
            }
        }
        Ok(resolved)
    }

    /// Newest-first prediction history for an account
    pub async fn history(&self, address: &str) -> Result<Vec<Prediction>> {
        self.store.list_predictions(address).await
    }

    pub fn sweep_interval_secs(&self) -> u64 {
        self.config.sweep_interval_secs
    }
}

fn apply_outcome(account: &mut UserAccount, reward: u32, won: bool) {
    if won {
        account.balance += Decimal::from(reward);
        account.correct_predictions += 1;
        account.streak += 1;
    } else {
        account.streak = 0;
    }
}

fn restore_stats(account: &mut UserAccount, snapshot: &UserAccount) {
    account.balance = snapshot.balance;
    account.streak = snapshot.streak;
    account.correct_predictions = snapshot.correct_predictions;
}
