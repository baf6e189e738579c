//! Ledger store — durable record keeping for accounts, predictions, trades
//!
//! The engine only ever talks to the [`LedgerStore`] trait; the concrete
//! backend is swappable. Every mutation is a single store call so a failed
//! operation never leaves partially-applied record state behind.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Prediction, PredictionStatus, Trade, UserAccount};

/// Fields of a prediction that change on resolution.
///
/// `status` must be terminal; the store rejects anything else and reports
/// `AlreadyResolved` for records that already left `Pending`, which makes the
/// transition settle exactly once under concurrent resolvers.
#[derive(Debug, Clone)]
pub struct ResolutionPatch {
    pub status: PredictionStatus,
    pub resolved_at: DateTime<Utc>,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fetch an account by wallet address
    async fn get_account(&self, address: &str) -> Result<UserAccount>;

    /// Create an account for a wallet address, or return the existing record.
    /// Never duplicates: a second call for a known address is a read.
    async fn create_account(&self, address: &str) -> Result<UserAccount>;

    /// Persist an account mutation. The stored version must match
    /// `account.version`; on mismatch the write is rejected with a conflict
    /// and nothing is applied. On success the returned record carries the
    /// bumped version.
    async fn update_account(&self, account: &UserAccount) -> Result<UserAccount>;

    async fn get_prediction(&self, id: &str) -> Result<Prediction>;

    async fn append_prediction(&self, prediction: &Prediction) -> Result<()>;

    /// Apply the one-way PENDING -> WON|LOST transition. Terminal records are
    /// left untouched and reported as `AlreadyResolved`.
    async fn update_prediction(&self, id: &str, patch: ResolutionPatch) -> Result<Prediction>;

    async fn append_trade(&self, trade: &Trade) -> Result<()>;

    /// Predictions for one account, newest first
    async fn list_predictions(&self, address: &str) -> Result<Vec<Prediction>>;

    /// Trades for one account, newest first
    async fn list_trades(&self, address: &str) -> Result<Vec<Trade>>;

    /// All pending predictions across accounts, for the resolution sweep
    async fn list_pending_predictions(&self) -> Result<Vec<Prediction>>;
}
