//! Result shapes returned to the dashboard.
//!
//! These are plain serializable values computed fresh per request. Field
//! names are camelCase on the wire to match the front end.

use serde::{Deserialize, Serialize};

use super::enums::{PositionSide, Side};

/// Headline statistics panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickStats {
    /// Win rate with two decimals, e.g. `"50.00%"`.
    pub win_rate: String,
    /// Number of trades with non-zero realized PnL, thousands-grouped.
    pub total_trades: String,
    /// Best realized PnL, e.g. `"$50.00"`.
    pub best_trade: String,
}

impl QuickStats {
    /// Value shown when the user has no active connections.
    pub fn empty() -> Self {
        Self { win_rate: "0.00%".into(), total_trades: "0".into(), best_trade: "$0".into() }
    }
}

/// A recent closing trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeItem {
    pub id: String,
    #[serde(rename = "type")]
    pub side: Side,
    /// Pair without settlement suffix (`BTC/USDT`).
    pub pair: String,
    pub amount: f64,
    pub price: f64,
    /// Display time (`D.M. HH:mm`).
    pub time: String,
    pub profit: f64,
    pub timestamp: i64,
}

/// An open position row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionItem {
    pub id: String,
    /// Pair label (`BTC/USDT`).
    pub pair: String,
    /// Exchange market id used by the streams (`BTCUSDT`).
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: f64,
    pub current_price: f64,
    /// Positive magnitude; direction lives in `side`.
    pub size: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
}

/// An open order row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub pair: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub side: Side,
    pub price: f64,
    pub amount: f64,
    pub filled: f64,
    pub status: String,
    pub time: String,
    pub timestamp: i64,
}

/// Balances and open positions across all connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub total_balance: f64,
    pub available_balance: f64,
    /// Always `total_balance - available_balance`.
    pub in_positions: f64,
    #[serde(rename = "unrealizedPnL")]
    pub unrealized_pnl: f64,
    pub positions: Vec<PositionItem>,
}

/// One line of the realized-PnL breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownLine {
    pub label: String,
    pub value: f64,
}

/// Realized PnL net of fees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedPnl {
    #[serde(rename = "totalPnL")]
    pub total_pnl: f64,
    pub breakdown: Vec<BreakdownLine>,
}

/// PnL of one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPnl {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub pnl: f64,
    pub trades_count: u32,
    /// Short weekday (`Mon`).
    pub day_label: String,
}

/// A point on the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHistoryPoint {
    /// ms since epoch.
    pub timestamp: i64,
    pub value: f64,
}

/// Reconstructed equity curve for a timeframe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioHistory {
    pub current_value: f64,
    pub change_amount: f64,
    pub change_percent: f64,
    /// Ascending by timestamp.
    pub history: Vec<PortfolioHistoryPoint>,
}

/// Short-lived key authorizing the private account stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamKey {
    pub listen_key: String,
    pub is_testnet: bool,
    /// Connection that issued the key (needed for keepalive/close).
    pub connection_id: String,
}

/// Outcome of a trade sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncReport {
    pub fn synced(count: u64) -> Self {
        Self { success: true, count: Some(count), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, count: None, error: Some(error.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_data_wire_names() {
        let json = serde_json::to_value(AccountData::default()).unwrap();
        assert!(json.get("unrealizedPnL").is_some());
        assert!(json.get("inPositions").is_some());
    }

    #[test]
    fn sync_report_omits_empty_fields() {
        let json = serde_json::to_string(&SyncReport::synced(3)).unwrap();
        assert_eq!(json, r#"{"success":true,"count":3}"#);
        let json = serde_json::to_string(&SyncReport::failed("No user")).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"No user"}"#);
    }
}
