//! Account provisioning and the per-account write path
//!
//! Every balance/statistic mutation in the engine goes through
//! [`update_with_retry`]: read fresh state, apply the change in memory, and
//! persist it as one versioned write. A conflicting writer forces a reload
//! and another attempt, bounded by configuration. The [`AccountLocks`] map
//! serializes trade execution and prediction resolution per account;
//! different accounts never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::store::LedgerStore;
use crate::types::UserAccount;

/// One async mutex per wallet address
#[derive(Default)]
pub struct AccountLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for an address, created on first use
    pub fn for_address(&self, address: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Read-modify-write with optimistic-conflict retries.
///
/// `mutate` sees a freshly loaded record on every attempt; validation inside
/// it therefore always runs against current state. Conflicts are retried up
/// to `max_retries` times before surfacing as transient.
pub async fn update_with_retry<F>(
    store: &dyn LedgerStore,
    address: &str,
    max_retries: u32,
    mut mutate: F,
) -> Result<UserAccount>
where
    F: FnMut(&mut UserAccount) -> Result<()>,
{
    let mut attempts: u32 = 0;
    loop {
        let mut account = store.get_account(address).await?;
        mutate(&mut account)?;

        match store.update_account(&account).await {
            Ok(updated) => return Ok(updated),
            Err(EngineError::Conflict { .. }) => {
                attempts += 1;
                if attempts >= max_retries {
                    return Err(EngineError::Conflict { attempts });
                }
                debug!(address, attempts, "account update conflicted, retrying with fresh state");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Wallet-facing account provisioning
pub struct AccountManager {
    store: Arc<dyn LedgerStore>,
}

impl AccountManager {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Open-or-get for a connecting wallet. A second connection with the
    /// same address returns the existing record untouched.
    pub async fn connect(&self, address: &str) -> Result<UserAccount> {
        if address.trim().is_empty() {
            return Err(EngineError::Validation(
                "wallet address must not be empty".to_string(),
            ));
        }

        let account = self.store.create_account(address).await?;
        info!(
            address,
            balance = %account.balance,
            "wallet connected"
        );
        Ok(account)
    }

    pub async fn account(&self, address: &str) -> Result<UserAccount> {
        self.store.get_account(address).await
    }
}
