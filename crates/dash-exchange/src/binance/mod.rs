//! Binance USDⓈ-M futures adapter.
//!
//! # Architecture
//!
//! ```text
//! BinanceFutures (ExchangeAdapter)
//! ├── FuturesClient   (signed REST, clock offset, rate limiter)
//! └── SymbolMapper    (BTCUSDT ↔ BTC/USDT:USDT ↔ BTC/USDT)
//! ```
//!
//! [`BinanceFutures::connect`] syncs the clock and loads `exchangeInfo`
//! before returning, so a connection whose keys or network are broken fails
//! here and is skipped by the caller.

pub mod auth;
pub mod config;
pub mod futures;
pub mod parse;
pub mod symbol_mapper;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use dash_core::time_util::DAY_MS;
use dash_core::types::{
    BalanceSnapshot, IncomeEvent, MarketInfo, Order, Platform, PositionSnapshot, Trade,
};
use tracing::{debug, info};

use self::config::BinanceFuturesConfig;
use self::futures::FuturesClient;
use self::symbol_mapper::SymbolMapper;
use crate::ExchangeAdapter;

/// Income page size (endpoint maximum).
const INCOME_PAGE: u32 = 1000;

/// Upper bound on income pages per call.
const INCOME_MAX_PAGES: usize = 20;

/// Widest `startTime`..`endTime` span `userTrades` accepts.
const USER_TRADES_SPAN_MS: i64 = 7 * DAY_MS;

/// Inclusive `[start, end]` request windows covering `since..=until`,
/// oldest first.
fn trade_windows(since: i64, until: i64) -> impl Iterator<Item = (i64, i64)> {
    let mut start = since;
    std::iter::from_fn(move || {
        if start > until {
            return None;
        }
        let end = (start + USER_TRADES_SPAN_MS - 1).min(until);
        let window = (start, end);
        start = end + 1;
        Some(window)
    })
}

/// A connected Binance futures account.
pub struct BinanceFutures {
    client: FuturesClient,
    mapper: SymbolMapper,
}

impl BinanceFutures {
    /// Build the client, sync the clock offset and load markets.
    pub async fn connect(config: BinanceFuturesConfig) -> Result<Self> {
        let testnet = config.testnet;
        let client = FuturesClient::new(config)?;
        client.sync_time().await.context("clock sync failed")?;
        let info = client.get_exchange_info().await.context("failed to load markets")?;
        let mapper = SymbolMapper::from_markets(parse::parse_markets(&info));
        if mapper.is_empty() {
            return Err(anyhow!("exchangeInfo returned no tradable markets"));
        }
        info!("[binance] connected (testnet={testnet}), {} markets", mapper.len());
        Ok(Self { client, mapper })
    }

    fn market_id(&self, symbol: &str) -> Result<&str> {
        self.mapper.to_exchange(symbol).ok_or_else(|| anyhow!("unknown market {symbol}"))
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceFutures {
    fn platform(&self) -> Platform {
        Platform::Binance
    }

    fn is_testnet(&self) -> bool {
        self.client.is_testnet()
    }

    fn markets(&self) -> &[MarketInfo] {
        self.mapper.markets()
    }

    fn market(&self, symbol: &str) -> Option<&MarketInfo> {
        self.mapper.resolve(symbol)
    }

    async fn fetch_my_trades(&self, symbol: &str, since: Option<i64>, limit: u32) -> Result<Vec<Trade>> {
        let id = self.market_id(symbol)?;
        let Some(since) = since else {
            let raw = self.client.get_user_trades(id, None, None, limit).await?;
            return Ok(parse::parse_trades(&raw, &self.mapper));
        };

        // One request covers a week at most, so walk forward until the page
        // is full or the windows reach the present.
        let mut out = Vec::new();
        for (start, end) in trade_windows(since, self.client.server_now()) {
            let want = limit.saturating_sub(out.len() as u32);
            if want == 0 {
                break;
            }
            let raw = self.client.get_user_trades(id, Some(start), Some(end), want).await?;
            out.extend(parse::parse_trades(&raw, &self.mapper));
        }
        debug!("[binance] {id}: {} trades since {since}", out.len());
        Ok(out)
    }

    async fn fetch_balance(&self) -> Result<BalanceSnapshot> {
        let raw = self.client.get_account_info().await?;
        Ok(parse::parse_balance(&raw))
    }

    async fn fetch_positions(&self) -> Result<Vec<PositionSnapshot>> {
        let raw = self.client.get_positions().await?;
        Ok(parse::parse_positions(&raw, &self.mapper))
    }

    async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let id = symbol.map(|s| self.market_id(s)).transpose()?;
        let raw = self.client.get_open_orders(id).await?;
        Ok(parse::parse_orders(&raw, &self.mapper))
    }

    async fn fetch_income(&self, since: i64, until: i64) -> Result<Vec<IncomeEvent>> {
        let mut out = Vec::new();
        let mut cursor = since;
        for _ in 0..INCOME_MAX_PAGES {
            let raw = self.client.get_income(cursor, until, INCOME_PAGE).await?;
            let page = parse::parse_income(&raw, &self.mapper);
            let len = page.len();
            let last_ts = page.iter().map(|e| e.timestamp).max();
            out.extend(page);
            match last_ts {
                Some(ts) if len as u32 >= INCOME_PAGE && ts >= cursor => cursor = ts + 1,
                _ => break,
            }
        }
        debug!("[binance] {} income events", out.len());
        Ok(out)
    }

    async fn issue_stream_key(&self) -> Result<String> {
        self.client.create_listen_key().await
    }

    async fn keepalive_stream_key(&self, key: &str) -> Result<()> {
        self.client.keepalive_listen_key(key).await
    }

    async fn close_stream_key(&self, key: &str) -> Result<()> {
        self.client.close_listen_key(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_windows_cover_range_in_week_slices() {
        let since = 1_000;
        let until = since + 15 * DAY_MS;
        let windows: Vec<_> = trade_windows(since, until).collect();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], (since, since + USER_TRADES_SPAN_MS - 1));
        assert_eq!(windows[1].0, windows[0].1 + 1);
        assert_eq!(windows[2], (since + 2 * USER_TRADES_SPAN_MS, until));
        assert!(windows.iter().all(|(s, e)| e - s < USER_TRADES_SPAN_MS));
    }

    #[test]
    fn trade_windows_edge_cases() {
        assert_eq!(trade_windows(5, 5).collect::<Vec<_>>(), vec![(5, 5)]);
        assert_eq!(trade_windows(10, 5).count(), 0);
        assert_eq!(trade_windows(0, 365 * DAY_MS).count(), 53);
    }
}
