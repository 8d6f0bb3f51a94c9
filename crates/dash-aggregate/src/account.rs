//! Balances, open positions and resting orders.

use dash_core::dedup::OrderIdDedup;
use dash_core::types::{AccountData, Order, OrderItem, PositionItem};
use tracing::debug;

use crate::connections::ConnectedAccount;
use crate::fanout::{per_account, per_symbol};
use crate::normalize::{order_item, position_item};
use crate::Aggregator;

/// One account's share of [`AccountData`].
#[derive(Debug, Default)]
struct AccountPart {
    total: f64,
    free: f64,
    unrealized: f64,
    positions: Vec<PositionItem>,
}

impl Aggregator {
    /// Stablecoin balances, unrealized PnL and open positions across all
    /// connections.
    pub async fn account_data(&self, token: &str) -> AccountData {
        let accounts = self.accounts(token).await;
        self.account_data_of(&accounts).await
    }

    /// [`account_data`](Self::account_data) over already connected accounts.
    pub async fn account_data_of(&self, accounts: &[ConnectedAccount]) -> AccountData {
        let quotes = &self.watchlist.quote_assets;
        let parts = per_account(accounts, "account_data", |acc| async move {
            let (balance, positions) = tokio::join!(acc.adapter.fetch_balance(), acc.adapter.fetch_positions());
            let balance = balance?;
            let positions = positions?;
            let (total, free) = balance.sum_assets(quotes);
            anyhow::Ok(AccountPart {
                total,
                free,
                unrealized: balance.total_unrealized_pnl.unwrap_or(0.0),
                positions: positions.iter().filter_map(|p| position_item(&acc.connection.id, p)).collect(),
            })
        })
        .await;

        let mut data = AccountData::default();
        for part in parts {
            data.total_balance += part.total;
            data.available_balance += part.free;
            data.unrealized_pnl += part.unrealized;
            data.positions.extend(part.positions);
        }
        data.in_positions = data.total_balance - data.available_balance;
        data
    }

    /// Resting orders, newest first, each id once.
    pub async fn open_orders(&self, token: &str) -> Vec<OrderItem> {
        let accounts = self.accounts(token).await;
        let pairs = &self.watchlist.trading_pairs;

        let per_acc = per_account(&accounts, "open_orders", |acc| async move {
            let orders = collect_open_orders(acc, pairs).await;
            let mut dedup = OrderIdDedup::new();
            let orders = dedup.retain_first(orders, |o| o.id.as_str());
            anyhow::Ok(orders.iter().map(order_item).collect::<Vec<_>>())
        })
        .await;

        let mut items: Vec<OrderItem> = per_acc.into_iter().flatten().collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items
    }
}

/// Bulk query first; an empty or failed bulk result falls back to one query
/// per known watch-list market.
async fn collect_open_orders(acc: &ConnectedAccount, pairs: &[String]) -> Vec<Order> {
    match acc.adapter.fetch_open_orders(None).await {
        Ok(orders) if !orders.is_empty() => return orders,
        Ok(_) => {}
        Err(e) => debug!("[aggregate] bulk open orders on {} failed: {e:#}", acc.connection.id),
    }
    let symbols = acc.known_symbols(pairs);
    per_symbol(acc, &symbols, "open_orders", |s| acc.adapter.fetch_open_orders(Some(s)))
        .await
        .into_iter()
        .flatten()
        .collect()
}
