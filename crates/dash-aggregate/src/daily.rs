//! Daily realized-PnL buckets over a trailing window.

use std::collections::BTreeMap;

use dash_core::time_util::{days_back_midnight, trailing_dates, utc_date, weekday_label};
use dash_core::types::{DailyPnl, Trade};
use tracing::debug;

use crate::fanout::{per_account, per_symbol};
use crate::pager::TradePager;
use crate::Aggregator;

pub const DEFAULT_DAILY_DAYS: i64 = 14;
/// Longest window a caller can ask for.
pub const MAX_DAILY_DAYS: i64 = 365;

/// Window length in days: missing or non-positive falls back to the
/// default, anything past a year is capped.
pub fn daily_window(days: Option<i64>) -> i64 {
    days.filter(|d| *d > 0).unwrap_or(DEFAULT_DAILY_DAYS).min(MAX_DAILY_DAYS)
}

/// Dense, ascending buckets for `dates`; trades dated outside are ignored.
pub fn bucket_daily<'a>(dates: &[String], trades: impl IntoIterator<Item = &'a Trade>) -> Vec<DailyPnl> {
    let mut buckets: BTreeMap<&str, (f64, u32)> = dates.iter().map(|d| (d.as_str(), (0.0, 0))).collect();
    for trade in trades {
        let date = utc_date(trade.timestamp);
        if let Some((pnl, count)) = buckets.get_mut(date.as_str()) {
            *pnl += trade.realized_pnl;
            if trade.realized_pnl != 0.0 {
                *count += 1;
            }
        }
    }
    buckets
        .into_iter()
        .map(|(date, (pnl, trades_count))| DailyPnl {
            date: date.to_string(),
            pnl,
            trades_count,
            day_label: weekday_label(date),
        })
        .collect()
}

impl Aggregator {
    /// Realized PnL per UTC day for the last `days` days (default 14, at
    /// most [`MAX_DAILY_DAYS`]).
    pub async fn daily_pnl(&self, token: &str, days: Option<i64>) -> Vec<DailyPnl> {
        let days = daily_window(days);
        let now = self.now();
        let dates = trailing_dates(now, days);
        let since = days_back_midnight(now, days);

        let accounts = self.accounts(token).await;
        let pairs = &self.watchlist.trading_pairs;
        let page_size = self.watchlist.page_size;

        let per_acc = per_account(&accounts, "daily_pnl", |acc| async move {
            let symbols = acc.known_symbols(pairs);
            let pages = per_symbol(acc, &symbols, "trade history", |s| async move {
                let (trades, err) = TradePager::new(acc.adapter.as_ref(), s, since, page_size).collect().await;
                if let Some(e) = err {
                    debug!("[aggregate] daily pnl {s}: stopped after {} trades: {e:#}", trades.len());
                }
                anyhow::Ok(trades)
            })
            .await;
            anyhow::Ok(pages.into_iter().flatten().collect::<Vec<_>>())
        })
        .await;

        bucket_daily(&dates, per_acc.iter().flatten())
    }
}
