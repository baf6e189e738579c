//! Engine error taxonomy
//!
//! Every rejection happens before any mutation; `AlreadyResolved` is the one
//! informational kind (a safe no-op), and `Conflict` only surfaces after the
//! bounded internal retry budget is spent.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::Asset;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("insufficient funds: need {needed} SHM, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("insufficient holdings: need {needed} {asset}, have {available}")]
    InsufficientHoldings {
        asset: Asset,
        needed: Decimal,
        available: Decimal,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("prediction {0} already resolved")]
    AlreadyResolved(String),

    #[error("concurrent update conflict persisted after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("ledger store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("price feed unavailable: {0}")]
    FeedUnavailable(String),
}

impl EngineError {
    /// Transient failures a caller may safely retry with the same idempotency key
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Conflict { .. } | EngineError::StoreUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
