//! Raw Binance USDⓈ-M futures JSON → exchange-neutral records.
//!
//! Every parser is lenient: malformed numeric fields become `0`, rows missing
//! an id or symbol are dropped. Symbols are mapped to unified form through
//! the connection's [`SymbolMapper`].

use dash_core::json_util::{f64_or_zero, id_field, parse_f64_field, parse_i64_field, str_field};
use dash_core::types::{
    AssetBalance, BalanceSnapshot, IncomeEvent, MarketInfo, Order, PositionSnapshot, Side, Trade,
};
use serde_json::Value;

use super::symbol_mapper::SymbolMapper;

fn rows(val: &Value) -> &[Value] {
    val.as_array().map(Vec::as_slice).unwrap_or(&[])
}

// ---------------------------------------------------------------------------
// exchangeInfo
// ---------------------------------------------------------------------------

/// Perpetual contracts currently trading, from `GET /fapi/v1/exchangeInfo`.
pub fn parse_markets(info: &Value) -> Vec<MarketInfo> {
    let Some(symbols) = info.get("symbols").and_then(Value::as_array) else {
        return Vec::new();
    };

    symbols
        .iter()
        .filter(|s| str_field(s, "contractType").is_none_or(|t| t == "PERPETUAL"))
        .filter(|s| str_field(s, "status").is_none_or(|t| t == "TRADING"))
        .filter_map(|s| {
            let id = str_field(s, "symbol")?;
            let base = str_field(s, "baseAsset")?;
            let quote = str_field(s, "quoteAsset")?;
            let settle = str_field(s, "marginAsset").unwrap_or(quote);
            Some(MarketInfo {
                id: id.to_string(),
                symbol: format!("{base}/{quote}:{settle}"),
                base: base.to_string(),
                quote: quote.to_string(),
                settle: settle.to_string(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// userTrades
// ---------------------------------------------------------------------------

/// `GET /fapi/v1/userTrades`.
pub fn parse_trades(val: &Value, mapper: &SymbolMapper) -> Vec<Trade> {
    rows(val)
        .iter()
        .filter_map(|t| {
            let market_id = str_field(t, "symbol")?;
            Some(Trade {
                id: id_field(t, "id")?,
                order_id: id_field(t, "orderId").unwrap_or_default(),
                symbol: mapper.to_unified(market_id).to_string(),
                side: Side::from_exchange(str_field(t, "side").unwrap_or_default()),
                amount: f64_or_zero(t, "qty"),
                price: f64_or_zero(t, "price"),
                timestamp: parse_i64_field(t, "time").unwrap_or(0),
                realized_pnl: f64_or_zero(t, "realizedPnl"),
                fee: f64_or_zero(t, "commission"),
                fee_currency: str_field(t, "commissionAsset").map(str::to_string),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// account
// ---------------------------------------------------------------------------

/// `GET /fapi/v3/account`: wallet balance as total, available balance as free.
pub fn parse_balance(val: &Value) -> BalanceSnapshot {
    let assets = val
        .get("assets")
        .map(rows)
        .unwrap_or_default()
        .iter()
        .filter_map(|a| {
            Some(AssetBalance {
                asset: str_field(a, "asset")?.to_string(),
                total: f64_or_zero(a, "walletBalance"),
                free: f64_or_zero(a, "availableBalance"),
            })
        })
        .collect();

    BalanceSnapshot { assets, total_unrealized_pnl: parse_f64_field(val, "totalUnrealizedProfit") }
}

// ---------------------------------------------------------------------------
// positionRisk
// ---------------------------------------------------------------------------

/// `GET /fapi/v3/positionRisk`. Flat rows are kept; callers filter them.
pub fn parse_positions(val: &Value, mapper: &SymbolMapper) -> Vec<PositionSnapshot> {
    rows(val)
        .iter()
        .filter_map(|p| {
            let market_id = str_field(p, "symbol")?;
            let unrealized_pnl = f64_or_zero(p, "unRealizedProfit");
            let initial_margin = f64_or_zero(p, "initialMargin");
            Some(PositionSnapshot {
                symbol: mapper.to_unified(market_id).to_string(),
                market_id: market_id.to_string(),
                signed_amount: f64_or_zero(p, "positionAmt"),
                entry_price: f64_or_zero(p, "entryPrice"),
                mark_price: parse_f64_field(p, "markPrice").filter(|v| *v != 0.0),
                last_price: None,
                unrealized_pnl,
                percentage: (initial_margin > 0.0).then(|| unrealized_pnl / initial_margin * 100.0),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// openOrders
// ---------------------------------------------------------------------------

/// `GET /fapi/v1/openOrders`.
pub fn parse_orders(val: &Value, mapper: &SymbolMapper) -> Vec<Order> {
    rows(val)
        .iter()
        .filter_map(|o| {
            let market_id = str_field(o, "symbol")?;
            Some(Order {
                id: id_field(o, "orderId")?,
                symbol: mapper.to_unified(market_id).to_string(),
                order_type: str_field(o, "type").unwrap_or("limit").to_ascii_lowercase(),
                side: Side::from_exchange(str_field(o, "side").unwrap_or_default()),
                price: f64_or_zero(o, "price"),
                amount: f64_or_zero(o, "origQty"),
                filled: f64_or_zero(o, "executedQty"),
                status: str_field(o, "status").unwrap_or("NEW").to_ascii_lowercase(),
                timestamp: parse_i64_field(o, "time")
                    .or_else(|| parse_i64_field(o, "updateTime"))
                    .unwrap_or(0),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// income
// ---------------------------------------------------------------------------

/// `GET /fapi/v1/income`. Amounts are kept as reported (credit positive).
pub fn parse_income(val: &Value, mapper: &SymbolMapper) -> Vec<IncomeEvent> {
    rows(val)
        .iter()
        .filter_map(|i| {
            Some(IncomeEvent {
                symbol: str_field(i, "symbol")
                    .filter(|s| !s.is_empty())
                    .map(|s| mapper.to_unified(s).to_string()),
                kind: str_field(i, "incomeType").unwrap_or_default().to_string(),
                amount: parse_f64_field(i, "income")?,
                asset: str_field(i, "asset").unwrap_or_default().to_string(),
                timestamp: parse_i64_field(i, "time")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapper() -> SymbolMapper {
        SymbolMapper::from_markets(parse_markets(&json!({
            "symbols": [
                {"symbol": "BTCUSDT", "baseAsset": "BTC", "quoteAsset": "USDT", "marginAsset": "USDT",
                 "contractType": "PERPETUAL", "status": "TRADING"},
                {"symbol": "BTCUSDT_250926", "baseAsset": "BTC", "quoteAsset": "USDT", "marginAsset": "USDT",
                 "contractType": "CURRENT_QUARTER", "status": "TRADING"},
                {"symbol": "ETHUSDC", "baseAsset": "ETH", "quoteAsset": "USDC", "marginAsset": "USDC",
                 "contractType": "PERPETUAL", "status": "TRADING"},
            ]
        })))
    }

    #[test]
    fn markets_skip_delivery_contracts() {
        let m = mapper();
        assert_eq!(m.len(), 2);
        assert_eq!(m.to_unified("BTCUSDT"), "BTC/USDT:USDT");
        assert_eq!(m.to_exchange("ETH/USDC"), Some("ETHUSDC"));
    }

    #[test]
    fn trades_from_user_trades() {
        let raw = json!([{
            "symbol": "BTCUSDT", "id": 698759, "orderId": 25851813, "side": "SELL",
            "price": "7819.01", "qty": "0.002", "realizedPnl": "-0.91539999",
            "commission": "-0.07819010", "commissionAsset": "USDT", "time": 1569514978020_i64
        }]);
        let trades = parse_trades(&raw, &mapper());
        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.id, "698759");
        assert_eq!(t.order_id, "25851813");
        assert_eq!(t.symbol, "BTC/USDT:USDT");
        assert_eq!(t.side, Side::Sell);
        assert_eq!(t.amount, 0.002);
        assert_eq!(t.realized_pnl, -0.91539999);
        assert_eq!(t.timestamp, 1_569_514_978_020);
        assert_eq!(t.fee_currency.as_deref(), Some("USDT"));
    }

    #[test]
    fn balance_from_account() {
        let raw = json!({
            "totalUnrealizedProfit": "12.5",
            "assets": [
                {"asset": "USDT", "walletBalance": "1000.0", "availableBalance": "800.0"},
                {"asset": "USDC", "walletBalance": "50", "availableBalance": "50"},
            ]
        });
        let b = parse_balance(&raw);
        assert_eq!(b.total_unrealized_pnl, Some(12.5));
        assert_eq!(b.sum_assets(&["USDT".into(), "USDC".into()]), (1050.0, 850.0));
    }

    #[test]
    fn positions_keep_sign_and_percentage() {
        let raw = json!([
            {"symbol": "BTCUSDT", "positionAmt": "-0.5", "entryPrice": "60000", "markPrice": "59000",
             "unRealizedProfit": "500", "initialMargin": "2500"},
            {"symbol": "ETHUSDC", "positionAmt": "0", "entryPrice": "0", "markPrice": "0",
             "unRealizedProfit": "0", "initialMargin": "0"},
        ]);
        let p = parse_positions(&raw, &mapper());
        assert_eq!(p.len(), 2);
        assert_eq!(p[0].signed_amount, -0.5);
        assert_eq!(p[0].market_id, "BTCUSDT");
        assert_eq!(p[0].mark_price, Some(59000.0));
        assert_eq!(p[0].percentage, Some(20.0));
        assert_eq!(p[1].mark_price, None);
        assert_eq!(p[1].percentage, None);
    }

    #[test]
    fn orders_lowercase_type_and_status() {
        let raw = json!([{
            "orderId": 1917641, "symbol": "BTCUSDT", "status": "NEW", "type": "STOP_MARKET",
            "side": "BUY", "price": "0", "origQty": "0.40", "executedQty": "0", "time": 1579276756075_i64
        }]);
        let o = &parse_orders(&raw, &mapper())[0];
        assert_eq!(o.id, "1917641");
        assert_eq!(o.order_type, "stop_market");
        assert_eq!(o.status, "new");
        assert_eq!(o.side, Side::Buy);
        assert_eq!(o.amount, 0.4);
    }

    #[test]
    fn income_rows() {
        let raw = json!([
            {"symbol": "", "incomeType": "TRANSFER", "income": "-0.37500000", "asset": "USDT", "time": 1570608000000_i64},
            {"symbol": "BTCUSDT", "incomeType": "COMMISSION", "income": "-0.01000000", "asset": "USDT", "time": 1570636800000_i64},
            {"symbol": "BTCUSDT", "incomeType": "COMMISSION", "asset": "USDT", "time": 1570636800001_i64},
        ]);
        let events = parse_income(&raw, &mapper());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].symbol, None);
        assert_eq!(events[0].amount, -0.375);
        assert_eq!(events[1].symbol.as_deref(), Some("BTC/USDT:USDT"));
    }
}
