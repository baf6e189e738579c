//! Portfolio calculator
//!
//! Pure derivation of holdings, value and P&L from the trade ledger and the
//! current quotes. Holdings are never stored — every caller recomputes them
//! here so the ledger stays the single source of truth.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::types::{Asset, Trade, TradeSide, TradeStatus};

/// Derived portfolio figures for one account
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    /// Net asset quantity per asset (signed sum over completed trades)
    pub holdings: HashMap<Asset, Decimal>,
    /// Holdings valued at the supplied quotes, in SHM
    pub portfolio_value: Decimal,
    /// Sum of completed BUY costs, in SHM
    pub total_invested: Decimal,
    pub pnl: Decimal,
    /// pnl / total_invested * 100, or 0 when nothing was invested
    pub pnl_percent: Decimal,
}

/// Net holdings per asset over all COMPLETED trades
pub fn holdings(trades: &[Trade]) -> HashMap<Asset, Decimal> {
    let mut net: HashMap<Asset, Decimal> = HashMap::new();
    for trade in trades.iter().filter(|t| t.status == TradeStatus::Completed) {
        let entry = net.entry(trade.asset).or_insert(Decimal::ZERO);
        match trade.side {
            TradeSide::Buy => *entry += trade.amount,
            TradeSide::Sell => *entry -= trade.amount,
        }
    }
    net
}

/// Net holdings of a single asset
pub fn asset_holdings(trades: &[Trade], asset: Asset) -> Decimal {
    holdings(trades).get(&asset).copied().unwrap_or(Decimal::ZERO)
}

/// Full snapshot from the ledger and current quotes
pub fn snapshot(trades: &[Trade], quotes: &HashMap<Asset, Decimal>) -> PortfolioSnapshot {
    let holdings = holdings(trades);

    let portfolio_value: Decimal = holdings
        .iter()
        .map(|(asset, qty)| *qty * quotes.get(asset).copied().unwrap_or(Decimal::ZERO))
        .sum();

    let total_invested = trades
        .iter()
        .filter(|t| t.status == TradeStatus::Completed && t.side == TradeSide::Buy)
        .map(|t| t.total_cost)
        .sum::<Decimal>();

    let pnl: Decimal = portfolio_value - total_invested;
    let pnl_percent = if total_invested > Decimal::ZERO {
        pnl / total_invested * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    PortfolioSnapshot {
        holdings,
        portfolio_value,
        total_invested,
        pnl,
        pnl_percent,
    }
}
