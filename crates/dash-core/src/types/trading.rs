//! Exchange-neutral trading records.
//!
//! Exchange adapters translate their raw REST payloads into these structs;
//! everything downstream (aggregation, sync, live merge) only sees this shape.
//! Symbols use the unified `BASE/QUOTE:SETTLE` form (e.g. `BTC/USDT:USDT`)
//! alongside the exchange's own market id (e.g. `BTCUSDT`) where both matter.

use serde::{Deserialize, Serialize};

use super::enums::Side;

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

/// A single trade execution (fill) on the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Exchange execution id (unique per account).
    pub id: String,
    /// Id of the order this execution belongs to.
    pub order_id: String,
    /// Unified symbol.
    pub symbol: String,
    pub side: Side,
    /// Executed quantity.
    pub amount: f64,
    /// Execution price.
    pub price: f64,
    /// Execution time (ms since epoch).
    pub timestamp: i64,
    /// Realized PnL booked by this execution (0 for opening fills).
    pub realized_pnl: f64,
    /// Commission paid.
    pub fee: f64,
    /// Commission asset, when reported.
    pub fee_currency: Option<String>,
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// A position snapshot as reported by the exchange.
///
/// `signed_amount` carries the direction (positive long, negative short);
/// flat rows (`0`) are returned by some endpoints and filtered downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Unified symbol.
    pub symbol: String,
    /// Exchange market id (the key used by the price streams).
    pub market_id: String,
    pub signed_amount: f64,
    pub entry_price: f64,
    pub mark_price: Option<f64>,
    pub last_price: Option<f64>,
    pub unrealized_pnl: f64,
    /// Exchange-reported PnL percent, when the endpoint provides one.
    pub percentage: Option<f64>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// An order resting on the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Unified symbol.
    pub symbol: String,
    /// Lower-case order type (`limit`, `stop_market`, ...).
    pub order_type: String,
    pub side: Side,
    pub price: f64,
    pub amount: f64,
    pub filled: f64,
    /// Lower-case status (`new`, `partially_filled`, ...).
    pub status: String,
    /// Creation time (ms since epoch).
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

/// Balance of a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    /// Wallet balance.
    pub total: f64,
    /// Balance available for new positions.
    pub free: f64,
}

/// Account balance snapshot for one connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub assets: Vec<AssetBalance>,
    /// Account-wide unrealized PnL, when the exchange reports one.
    pub total_unrealized_pnl: Option<f64>,
}

impl BalanceSnapshot {
    /// Look up an asset by name (case-insensitive).
    pub fn asset(&self, name: &str) -> Option<&AssetBalance> {
        self.assets.iter().find(|a| a.asset.eq_ignore_ascii_case(name))
    }

    /// Sum `(total, free)` over the given assets.
    pub fn sum_assets(&self, names: &[String]) -> (f64, f64) {
        names
            .iter()
            .filter_map(|name| self.asset(name))
            .fold((0.0, 0.0), |(total, free), a| (total + a.total, free + a.free))
    }
}

// ---------------------------------------------------------------------------
// Income ledger
// ---------------------------------------------------------------------------

/// A ledger entry that moved the account balance (realized PnL, funding,
/// commission, transfer, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeEvent {
    pub symbol: Option<String>,
    /// Exchange income type (`REALIZED_PNL`, `FUNDING_FEE`, `TRANSFER`, ...).
    pub kind: String,
    /// Signed amount credited to the balance.
    pub amount: f64,
    pub asset: String,
    /// Event time (ms since epoch).
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Market metadata
// ---------------------------------------------------------------------------

/// A tradable market known to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    /// Exchange market id (`BTCUSDT`).
    pub id: String,
    /// Unified symbol (`BTC/USDT:USDT`).
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub settle: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_assets_ignores_missing() {
        let balance = BalanceSnapshot {
            assets: vec![
                AssetBalance { asset: "USDT".into(), total: 100.0, free: 60.0 },
                AssetBalance { asset: "BNB".into(), total: 5.0, free: 5.0 },
            ],
            total_unrealized_pnl: None,
        };
        let (total, free) = balance.sum_assets(&["USDT".into(), "USDC".into()]);
        assert_eq!(total, 100.0);
        assert_eq!(free, 60.0);
    }
}
