//! Core types used throughout the engine
//!
//! Defines accounts, predictions, trades and the supporting enums.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported trading assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    BTC,
    ETH,
}

impl Asset {
    /// All assets the engine quotes and trades
    pub const ALL: [Asset; 2] = [Asset::BTC, Asset::ETH];

    /// Symbol used by the external price API (CoinGecko coin id)
    pub fn coingecko_id(&self) -> &'static str {
        match self {
            Asset::BTC => "bitcoin",
            Asset::ETH => "ethereum",
        }
    }

    /// Seed quote used before the first successful feed refresh
    pub fn seed_price(&self) -> Decimal {
        match self {
            Asset::BTC => dec!(43250),
            Asset::ETH => dec!(2640),
        }
    }

    /// Lower clamp applied to synthetically perturbed fallback quotes
    pub fn floor_price(&self) -> Decimal {
        match self {
            Asset::BTC => dec!(30000),
            Asset::ETH => dec!(1500),
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BTC" => Some(Asset::BTC),
            "ETH" => Some(Asset::ETH),
            _ => None,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::BTC => write!(f, "BTC"),
            Asset::ETH => write!(f, "ETH"),
        }
    }
}

/// Predicted price direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "UP" => Some(Direction::Up),
            "DOWN" => Some(Direction::Down),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// Supported prediction timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Hour1,
    Hour4,
    Day1,
    Week1,
}

impl Timeframe {
    /// Get duration in seconds
    pub fn duration_secs(&self) -> u64 {
        match self {
            Timeframe::Hour1 => 60 * 60,
            Timeframe::Hour4 => 4 * 60 * 60,
            Timeframe::Day1 => 24 * 60 * 60,
            Timeframe::Week1 => 7 * 24 * 60 * 60,
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "1H" => Some(Timeframe::Hour1),
            "4H" => Some(Timeframe::Hour4),
            "1D" => Some(Timeframe::Day1),
            "1W" => Some(Timeframe::Week1),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Hour1 => write!(f, "1H"),
            Timeframe::Hour4 => write!(f, "4H"),
            Timeframe::Day1 => write!(f, "1D"),
            Timeframe::Week1 => write!(f, "1W"),
        }
    }
}

/// Prediction lifecycle status
///
/// Transitions exactly once from Pending to a terminal state and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionStatus {
    Pending,
    Won,
    Lost,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PredictionStatus::Pending)
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionStatus::Pending => write!(f, "PENDING"),
            PredictionStatus::Won => write!(f, "WON"),
            PredictionStatus::Lost => write!(f, "LOST"),
        }
    }
}

/// Trade side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Trade status — a trade either settles immediately or fails outright
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Completed,
    Failed,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Completed => write!(f, "COMPLETED"),
            TradeStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Per-wallet account record
///
/// The wallet address is the identity; there is no surrogate id. The
/// `version` field is the optimistic-concurrency token bumped by the store
/// on every successful update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Wallet address (unique, immutable)
    pub address: String,
    /// Spendable SHM token balance, never negative
    pub balance: Decimal,
    /// Consecutive won predictions, reset to zero on any loss
    pub streak: u32,
    /// Total predictions ever made (monotonic)
    pub total_predictions: u64,
    /// Correct predictions (monotonic, <= total_predictions)
    pub correct_predictions: u64,
    /// Optimistic-update version, bumped on every store write
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// Prediction accuracy as a percentage, 0 when no predictions were made
    pub fn accuracy_pct(&self) -> f64 {
        if self.total_predictions == 0 {
            return 0.0;
        }
        self.correct_predictions as f64 / self.total_predictions as f64 * 100.0
    }
}

/// A directional price prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    /// Owning wallet address
    pub account: String,
    pub asset: Asset,
    pub direction: Direction,
    /// Confidence percentage within the configured bounds (default 50-100)
    pub confidence: u8,
    /// Price snapshot at creation, immutable
    pub entry_price: Decimal,
    pub timeframe: Timeframe,
    pub status: PredictionStatus,
    /// Reward computed once at creation; credited only on a win
    pub reward_tokens: u32,
    /// Caller-supplied idempotency key for safe retries
    #[serde(default)]
    pub request_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, on the transition out of Pending
    pub resolved_at: Option<DateTime<Utc>>,
}

/// An executed buy/sell against the simulated balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    /// Owning wallet address
    pub account: String,
    pub asset: Asset,
    pub side: TradeSide,
    /// Asset quantity, always positive
    pub amount: Decimal,
    /// Price snapshot at execution
    pub price: Decimal,
    /// amount * price, in SHM
    pub total_cost: Decimal,
    pub status: TradeStatus,
    /// Caller-supplied settlement reference / idempotency key
    #[serde(default)]
    pub client_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One point of the rolling price history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSample {
    pub ts: DateTime<Utc>,
    pub prices: std::collections::HashMap<Asset, Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_round_trips_from_str() {
        assert_eq!(Asset::from_str("btc"), Some(Asset::BTC));
        assert_eq!(Asset::from_str("ETH"), Some(Asset::ETH));
        assert_eq!(Asset::from_str("DOGE"), None);
    }

    #[test]
    fn timeframe_labels_match_durations() {
        assert_eq!(Timeframe::from_str("1h"), Some(Timeframe::Hour1));
        assert_eq!(Timeframe::Week1.duration_secs(), 7 * 24 * 3600);
        assert_eq!(format!("{}", Timeframe::Day1), "1D");
    }

    #[test]
    fn accuracy_is_zero_without_predictions() {
        let account = UserAccount {
            address: "0xabc".to_string(),
            balance: dec!(100),
            streak: 0,
            total_predictions: 0,
            correct_predictions: 0,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(account.accuracy_pct(), 0.0);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!PredictionStatus::Pending.is_terminal());
        assert!(PredictionStatus::Won.is_terminal());
        assert!(PredictionStatus::Lost.is_terminal());
    }
}
