//! Equity curve reconstruction.
//!
//! The exchange only reports the current balance. Past values are derived by
//! walking balance-changing events backwards from it: each event's amount is
//! subtracted, giving the balance just before that event.

use dash_core::time_util::DAY_MS;
use dash_core::types::{IncomeEvent, PortfolioHistory, PortfolioHistoryPoint, Timeframe, Trade};
use tracing::debug;

use crate::connections::ConnectedAccount;
use crate::fanout::{per_account, per_symbol};
use crate::pager::TradePager;
use crate::Aggregator;

/// A signed change of the account balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceEvent {
    pub timestamp: i64,
    pub amount: f64,
}

impl BalanceEvent {
    pub fn from_income(event: &IncomeEvent) -> Self {
        Self { timestamp: event.timestamp, amount: event.amount }
    }

    /// Synthetic event for a fill: realized PnL net of commission.
    pub fn from_trade(trade: &Trade) -> Self {
        Self { timestamp: trade.timestamp, amount: trade.realized_pnl - trade.fee }
    }
}

/// Rebuild the curve over `(start, now)` ending at `current`.
///
/// Events outside the open window are dropped. Events sharing a timestamp
/// collapse into one point carrying the balance before all of them. The
/// result starts with a point pinned at `start` and ends with `(now, current)`.
pub fn reconstruct(current: f64, mut events: Vec<BalanceEvent>, start: i64, now: i64) -> PortfolioHistory {
    events.retain(|e| e.timestamp > start && e.timestamp < now);
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut points = vec![PortfolioHistoryPoint { timestamp: now, value: current }];
    let mut balance = current;
    for event in events {
        balance -= event.amount;
        match points.last_mut() {
            Some(p) if p.timestamp == event.timestamp => p.value = balance,
            _ => points.push(PortfolioHistoryPoint { timestamp: event.timestamp, value: balance }),
        }
    }
    if start < now {
        points.push(PortfolioHistoryPoint { timestamp: start, value: balance });
    }
    points.reverse();

    let first = points.first().map_or(current, |p| p.value);
    let change_amount = current - first;
    let change_percent = if first == 0.0 { 0.0 } else { change_amount / first * 100.0 };
    PortfolioHistory { current_value: current, change_amount, change_percent, history: points }
}

impl Aggregator {
    /// Equity curve for `timeframe`, ending at the live stablecoin balance.
    pub async fn portfolio_history(&self, token: &str, timeframe: Timeframe) -> PortfolioHistory {
        let now = self.now();
        let start = now - timeframe.days() * DAY_MS;
        let accounts = self.accounts(token).await;
        if accounts.is_empty() {
            return PortfolioHistory::default();
        }

        let (account, events) = tokio::join!(
            self.account_data_of(&accounts),
            per_account(&accounts, "portfolio_history", |acc| async move {
                anyhow::Ok(self.balance_events(acc, start, now).await)
            }),
        );
        let events: Vec<BalanceEvent> = events.into_iter().flatten().collect();
        debug!("[aggregate] portfolio {timeframe}: {} events", events.len());
        reconstruct(account.total_balance, events, start, now)
    }

    /// Ledger events of one account in stablecoin assets; falls back to fills
    /// on the default pairs when the ledger is unavailable or empty.
    async fn balance_events(&self, acc: &ConnectedAccount, start: i64, now: i64) -> Vec<BalanceEvent> {
        let quotes = &self.watchlist.quote_assets;
        match acc.adapter.fetch_income(start, now).await {
            Ok(income) if !income.is_empty() => {
                return income
                    .iter()
                    .filter(|e| quotes.iter().any(|q| q.eq_ignore_ascii_case(&e.asset)))
                    .map(BalanceEvent::from_income)
                    .collect();
            }
            Ok(_) => debug!("[aggregate] no income on {}, using fills", acc.connection.id),
            Err(e) => debug!("[aggregate] income on {} failed, using fills: {e:#}", acc.connection.id),
        }

        let symbols = acc.known_symbols(&self.watchlist.recent_trades_pairs);
        let page_size = self.watchlist.page_size;
        let pages = per_symbol(acc, &symbols, "trade history", |s| async move {
            let (trades, _) = TradePager::new(acc.adapter.as_ref(), s, start, page_size).collect().await;
            anyhow::Ok(trades)
        })
        .await;
        pages.iter().flatten().map(BalanceEvent::from_trade).filter(|e| e.amount != 0.0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_709_802_300_000;

    #[test]
    fn walks_back_from_current() {
        let start = NOW - 7 * DAY_MS;
        let events = vec![BalanceEvent { timestamp: NOW - DAY_MS, amount: 100.0 }];
        let h = reconstruct(1000.0, events, start, NOW);
        let values: Vec<f64> = h.history.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![900.0, 900.0, 1000.0]);
        assert_eq!(h.history[0].timestamp, start);
        assert_eq!(h.change_amount, 100.0);
        assert!((h.change_percent - 100.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn strictly_ascending_with_ties_and_outliers() {
        let start = NOW - DAY_MS;
        let events = vec![
            BalanceEvent { timestamp: NOW - 1000, amount: 5.0 },
            BalanceEvent { timestamp: NOW - 1000, amount: -2.0 },
            BalanceEvent { timestamp: NOW - 2 * DAY_MS, amount: 50.0 },
            BalanceEvent { timestamp: NOW + 1, amount: 50.0 },
            BalanceEvent { timestamp: start, amount: 7.0 },
        ];
        let h = reconstruct(100.0, events, start, NOW);
        assert_eq!(h.history.len(), 3);
        assert!(h.history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(h.history[1].value, 97.0);
        assert_eq!(h.change_amount, h.history[2].value - h.history[0].value);
    }

    #[test]
    fn zero_start_balance_has_zero_percent() {
        let events = vec![BalanceEvent { timestamp: NOW - 10, amount: 50.0 }];
        let h = reconstruct(50.0, events, NOW - DAY_MS, NOW);
        assert_eq!(h.history[0].value, 0.0);
        assert_eq!(h.change_percent, 0.0);
        assert_eq!(h.change_amount, 50.0);
    }

    #[test]
    fn fills_net_commission() {
        use dash_core::types::Side;
        let t = Trade {
            id: "1".into(),
            order_id: "1".into(),
            symbol: "BTC/USDT:USDT".into(),
            side: Side::Sell,
            amount: 1.0,
            price: 1.0,
            timestamp: 1,
            realized_pnl: 10.0,
            fee: 0.5,
            fee_currency: None,
        };
        assert_eq!(BalanceEvent::from_trade(&t).amount, 9.5);
    }
}
