//! Binance futures stream message parser.
//!
//! Two feeds are consumed:
//!
//! - public `!markPrice@arr`: a JSON array of `markPriceUpdate` objects
//!   (`s` symbol, `p` mark price as string)
//! - private user-data stream: `ACCOUNT_UPDATE` with position rows under
//!   `a.P` (`s` symbol, `pa` signed amount, `ep` entry price, `up` unrealized
//!   PnL) and `listenKeyExpired` when the key lapses
//!
//! Anything else (order updates, margin calls, acks) is ignored.

use dash_core::json_util::{parse_f64_field, str_field};
use serde_json::Value;

/// One change to apply to the position book.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Latest mark price of a market (`BTCUSDT`).
    Price { symbol: String, price: f64 },
    Position(PositionDelta),
    /// The private stream's key expired; the stream must be re-established.
    StreamExpired,
}

/// A position row from an account update.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionDelta {
    /// Market id (`BTCUSDT`).
    pub symbol: String,
    /// Signed amount; exactly `0` means the position was closed.
    pub amount: f64,
    pub entry_price: f64,
    pub unrealized_pnl: Option<f64>,
}

/// Parse a message of the public mark-price feed.
pub fn parse_market_message(text: &str) -> Vec<LiveEvent> {
    let Ok(v) = serde_json::from_str::<Value>(text) else {
        return Vec::new();
    };
    match &v {
        Value::Array(items) => items.iter().filter_map(parse_mark_price).collect(),
        Value::Object(_) => parse_mark_price(&v).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn parse_mark_price(v: &Value) -> Option<LiveEvent> {
    let symbol = str_field(v, "s")?;
    let price = parse_f64_field(v, "p")?;
    Some(LiveEvent::Price { symbol: symbol.to_string(), price })
}

/// Parse a message of the private user-data stream.
pub fn parse_user_message(text: &str) -> Vec<LiveEvent> {
    let Ok(v) = serde_json::from_str::<Value>(text) else {
        return Vec::new();
    };
    match str_field(&v, "e") {
        Some("ACCOUNT_UPDATE") => parse_account_update(&v),
        Some("listenKeyExpired") => vec![LiveEvent::StreamExpired],
        _ => Vec::new(),
    }
}

fn parse_account_update(v: &Value) -> Vec<LiveEvent> {
    let Some(rows) = v.get("a").and_then(|a| a.get("P")).and_then(Value::as_array) else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| {
            Some(LiveEvent::Position(PositionDelta {
                symbol: str_field(row, "s")?.to_string(),
                amount: parse_f64_field(row, "pa")?,
                entry_price: parse_f64_field(row, "ep").unwrap_or(0.0),
                unrealized_pnl: parse_f64_field(row, "up"),
            }))
        })
        .collect()
}
