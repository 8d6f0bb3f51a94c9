//! Concurrent fan-out with isolated failures.
//!
//! Every item (account or symbol) runs concurrently; the join waits for all of
//! them and keeps only the successes. Per-symbol failures are expected (pair
//! not listed, no permission) and logged at `debug`; per-account failures at
//! `warn`.

use std::future::Future;

use anyhow::Result;
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::connections::ConnectedAccount;

/// Run `fetch` for every symbol of one account.
pub async fn per_symbol<'a, T, F, Fut>(
    account: &'a ConnectedAccount,
    symbols: &'a [String],
    op: &str,
    fetch: F,
) -> Vec<T>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let results = join_all(symbols.iter().map(|symbol| {
        let fut = fetch(symbol.as_str());
        async move { (symbol, fut.await) }
    }))
    .await;

    results
        .into_iter()
        .filter_map(|(symbol, result)| match result {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("[aggregate] {op} {symbol} on {} failed: {e:#}", account.connection.id);
                None
            }
        })
        .collect()
}

/// Run `work` for every account.
pub async fn per_account<'a, T, F, Fut>(accounts: &'a [ConnectedAccount], op: &str, work: F) -> Vec<T>
where
    F: Fn(&'a ConnectedAccount) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let results = join_all(accounts.iter().map(|account| {
        let fut = work(account);
        async move { (account, fut.await) }
    }))
    .await;

    results
        .into_iter()
        .filter_map(|(account, result)| match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("[aggregate] {op} on {} failed: {e:#}", account.connection.id);
                None
            }
        })
        .collect()
}
