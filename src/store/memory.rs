//! In-process ledger store
//!
//! Backs the engine with plain maps behind RwLocks. Each mutation happens
//! under one write guard, so records are never observable half-written.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{EngineError, Result};
use crate::store::{LedgerStore, ResolutionPatch};
use crate::types::{Prediction, PredictionStatus, Trade, UserAccount};

pub struct MemoryStore {
    accounts: RwLock<HashMap<String, UserAccount>>,
    predictions: RwLock<HashMap<String, Prediction>>,
    trades: RwLock<HashMap<String, Vec<Trade>>>,
    /// Balance granted to newly provisioned accounts
    starting_balance: Decimal,
}

impl MemoryStore {
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            predictions: RwLock::new(HashMap::new()),
            trades: RwLock::new(HashMap::new()),
            starting_balance,
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_account(&self, address: &str) -> Result<UserAccount> {
        self.accounts
            .read()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("account {address}")))
    }

    async fn create_account(&self, address: &str) -> Result<UserAccount> {
        let mut accounts = self.accounts.write().unwrap();
        if let Some(existing) = accounts.get(address) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let account = UserAccount {
            address: address.to_string(),
            balance: self.starting_balance,
            streak: 0,
            total_predictions: 0,
            correct_predictions: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(address.to_string(), account.clone());
        Ok(account)
    }

    async fn update_account(&self, account: &UserAccount) -> Result<UserAccount> {
        if account.balance.is_sign_negative() {
            return Err(EngineError::Validation(format!(
                "account {} balance would go negative",
                account.address
            )));
        }

        let mut accounts = self.accounts.write().unwrap();
        let stored = accounts
            .get_mut(&account.address)
            .ok_or_else(|| EngineError::NotFound(format!("account {}", account.address)))?;

        if stored.version != account.version {
            return Err(EngineError::Conflict { attempts: 1 });
        }

        let mut updated = account.clone();
        updated.version += 1;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn get_prediction(&self, id: &str) -> Result<Prediction> {
        self.predictions
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("prediction {id}")))
    }

    async fn append_prediction(&self, prediction: &Prediction) -> Result<()> {
        self.predictions
            .write()
            .unwrap()
            .insert(prediction.id.clone(), prediction.clone());
        Ok(())
    }

    async fn update_prediction(&self, id: &str, patch: ResolutionPatch) -> Result<Prediction> {
        if !patch.status.is_terminal() {
            return Err(EngineError::Validation(
                "resolution status must be WON or LOST".to_string(),
            ));
        }

        let mut predictions = self.predictions.write().unwrap();
        let stored = predictions
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("prediction {id}")))?;

        if stored.status != PredictionStatus::Pending {
            return Err(EngineError::AlreadyResolved(id.to_string()));
        }

        stored.status = patch.status;
        stored.resolved_at = Some(patch.resolved_at);
        Ok(stored.clone())
    }

    async fn append_trade(&self, trade: &Trade) -> Result<()> {
        self.trades
            .write()
            .unwrap()
            .entry(trade.account.clone())
            .or_default()
            .push(trade.clone());
        Ok(())
    }

    async fn list_predictions(&self, address: &str) -> Result<Vec<Prediction>> {
        let mut rows: Vec<Prediction> = self
            .predictions
            .read()
            .unwrap()
            .values()
            .filter(|p| p.account == address)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_trades(&self, address: &str) -> Result<Vec<Trade>> {
        let mut rows = self
            .trades
            .read()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_pending_predictions(&self) -> Result<Vec<Prediction>> {
        Ok(self
            .predictions
            .read()
            .unwrap()
            .values()
            .filter(|p| p.status == PredictionStatus::Pending)
            .cloned()
            .collect())
    }
}
