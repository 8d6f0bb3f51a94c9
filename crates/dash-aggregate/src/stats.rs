//! Trade-history panels: quick stats, recent trades, realized PnL.

use dash_core::types::symbol::normalize_filter;
use dash_core::types::{BreakdownLine, QuickStats, RealizedPnl, TradeItem};
use tracing::debug;

use crate::connections::ConnectedAccount;
use crate::fanout::{per_account, per_symbol};
use crate::normalize::{WinTally, trade_item};
use crate::Aggregator;

pub const FUTURES_PNL_LABEL: &str = "Futures P&L";
pub const FEES_LABEL: &str = "Fees Paid";

/// Symbols the quick-stats panel scans on one account.
///
/// With an asset filter the watch list narrows to the one market whose id or
/// compact symbol matches case/format-insensitively; an unmatched filter is
/// passed through upper-cased. `"ALL"` or blank means the default list.
pub fn quick_stats_symbols(account: &ConnectedAccount, filter: Option<&str>, defaults: &[String]) -> Vec<String> {
    let filter = filter.map(str::trim).filter(|f| !f.is_empty() && *f != "ALL");
    let Some(filter) = filter else {
        return account.known_symbols(defaults);
    };
    let needle = normalize_filter(filter);
    let matched = account.adapter.markets().iter().find(|m| {
        m.id.to_ascii_lowercase() == needle || m.symbol.replace('/', "").to_ascii_lowercase() == needle
    });
    vec![matched.map(|m| m.symbol.clone()).unwrap_or_else(|| filter.to_uppercase())]
}

impl Aggregator {
    /// Win rate, closed-trade count and best trade over the recent window.
    pub async fn quick_stats(&self, token: &str, asset_filter: Option<&str>) -> QuickStats {
        let conns = self.active_connections(token).await;
        if conns.is_empty() {
            return QuickStats::empty();
        }
        let accounts = self.connect_all(conns).await;
        let limit = self.watchlist.quick_stats_limit;
        let defaults = &self.watchlist.quick_stats_pairs;

        let tallies = per_account(&accounts, "quick_stats", |acc| async move {
            let symbols = quick_stats_symbols(acc, asset_filter, defaults);
            let pages = per_symbol(acc, &symbols, "trades", |s| acc.adapter.fetch_my_trades(s, None, limit)).await;
            let mut tally = WinTally::default();
            for trade in pages.iter().flatten() {
                tally.record(trade.realized_pnl);
            }
            anyhow::Ok(tally)
        })
        .await;

        let mut total = WinTally::default();
        for t in tallies {
            total.merge(t);
        }
        debug!("[aggregate] quick stats: {} closed, {} wins", total.closed, total.wins);
        total.to_stats()
    }

    /// Latest closing executions (non-zero realized PnL), newest first.
    pub async fn recent_trades(&self, token: &str) -> Vec<TradeItem> {
        let accounts = self.accounts(token).await;
        let limit = self.watchlist.recent_trades_limit;
        let pairs = &self.watchlist.recent_trades_pairs;

        let per_acc = per_account(&accounts, "recent_trades", |acc| async move {
            let symbols = acc.known_symbols(pairs);
            let pages = per_symbol(acc, &symbols, "trades", |s| acc.adapter.fetch_my_trades(s, None, limit)).await;
            anyhow::Ok(pages
                .iter()
                .flatten()
                .filter(|t| t.realized_pnl != 0.0)
                .map(trade_item)
                .collect::<Vec<_>>())
        })
        .await;

        let mut items: Vec<TradeItem> = per_acc.into_iter().flatten().collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items.truncate(self.watchlist.recent_trades_max);
        items
    }

    /// Realized PnL net of commission over the last trades of every pair.
    pub async fn realized_pnl(&self, token: &str) -> RealizedPnl {
        let accounts = self.accounts(token).await;
        let limit = self.watchlist.realized_limit;
        let pairs = &self.watchlist.trading_pairs;

        let sums = per_account(&accounts, "realized_pnl", |acc| async move {
            let symbols = acc.known_symbols(pairs);
            let pages = per_symbol(acc, &symbols, "trades", |s| acc.adapter.fetch_my_trades(s, None, limit)).await;
            anyhow::Ok(pages
                .iter()
                .flatten()
                .fold((0.0, 0.0), |(pnl, fees), t| (pnl + t.realized_pnl, fees + t.fee)))
        })
        .await;

        let (pnl, fees) = sums.into_iter().fold((0.0, 0.0), |(p, f), (ap, af)| (p + ap, f + af));
        RealizedPnl {
            total_pnl: pnl - fees,
            breakdown: vec![
                BreakdownLine { label: FUTURES_PNL_LABEL.into(), value: pnl },
                BreakdownLine { label: FEES_LABEL.into(), value: -fees },
            ],
        }
    }
}
