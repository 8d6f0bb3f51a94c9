//! Trade persistence: copy new executions into the trades table.

use dash_core::time_util::DAY_MS;
use dash_core::types::SyncReport;
use dash_store::{Session, TradeRow};
use tracing::{debug, error, info};

use crate::connections::ConnectedAccount;
use crate::fanout::{per_account, per_symbol};
use crate::pager::TradePager;
use crate::Aggregator;

impl Aggregator {
    /// Upsert executions newer than the last persisted one (or the lookback
    /// window) for every trading pair of every active connection.
    ///
    /// Re-running is idempotent: rows are keyed by
    /// `(trading_account_id, exchange_order_id)` and duplicates are ignored.
    /// `count` is the number of rows submitted in accepted batches.
    pub async fn sync_trades(&self, token: &str) -> SyncReport {
        if token.is_empty() {
            return SyncReport::failed("No token");
        }
        let Some(session) = self.session(token).await else {
            return SyncReport::failed("No user");
        };

        let conns = self.connections_of(&session).await;
        let accounts = self.connect_all(conns).await;
        let session = &session;
        let counts = per_account(&accounts, "sync", |acc| async move {
            anyhow::Ok(self.sync_account(session, acc).await)
        })
        .await;

        let total: u64 = counts.into_iter().sum();
        info!("[aggregate] synced {total} trades for {}", session.user.id);
        SyncReport::synced(total)
    }

    async fn sync_account(&self, session: &Session, acc: &ConnectedAccount) -> u64 {
        let floor = self.now() - self.watchlist.sync_lookback_days * DAY_MS;
        let since = match self.trades.latest_opened_at(session, &acc.connection.id).await {
            Ok(Some(last)) => (last + 1).max(floor),
            Ok(None) => floor,
            Err(e) => {
                error!("[aggregate] reading last trade of {} failed: {e:#}", acc.connection.id);
                return 0;
            }
        };
        debug!("[aggregate] syncing {} since {since}", acc.connection.id);

        let symbols = acc.known_symbols(&self.watchlist.trading_pairs);
        let page_size = self.watchlist.page_size;
        let counts = per_symbol(acc, &symbols, "sync", |s| async move {
            let mut pager = TradePager::new(acc.adapter.as_ref(), s, since, page_size);
            let mut synced = 0u64;
            loop {
                let page = match pager.next_page().await {
                    Ok(Some(page)) => page,
                    Ok(None) => break,
                    Err(e) => {
                        error!("[aggregate] sync {s} on {} stopped: {e:#}", acc.connection.id);
                        break;
                    }
                };
                let rows: Vec<TradeRow> = page
                    .iter()
                    .map(|t| TradeRow::from_trade(&session.user.id, &acc.connection, t))
                    .collect();
                match self.trades.upsert_trades(session, &rows).await {
                    Ok(()) => synced += rows.len() as u64,
                    Err(e) => error!("[aggregate] upsert of {} {s} rows failed: {e:#}", rows.len()),
                }
            }
            anyhow::Ok(synced)
        })
        .await;
        counts.into_iter().sum()
    }
}
