//! # dash-exchange
//!
//! Read-only exchange access for the dashboard.
//!
//! Each supported platform implements [`ExchangeAdapter`], a capability
//! interface returning exchange-neutral records from `dash-core`. The
//! [`registry`] module turns a stored connection into an adapter, selecting
//! the implementation by the connection's `exchange_platform` and pooling
//! built adapters per connection.
//!
//! ## Supported exchanges
//!
//! | Exchange | Module    | Products         | Streams           |
//! |----------|-----------|------------------|-------------------|
//! | Binance  | `binance` | USDⓈ-M futures   | listen-key based  |

pub mod binance;
pub mod rate_limiter;
pub mod registry;

use anyhow::Result;
use async_trait::async_trait;
use dash_core::types::{
    BalanceSnapshot, IncomeEvent, MarketInfo, Order, Platform, PositionSnapshot, Trade,
};

pub use registry::{ClientPool, Connector, PlatformConnector};

/// Capability interface of one connected exchange account.
///
/// Adapters are built fully initialised (clock synced, markets loaded) and
/// are shared across concurrent requests, so every method takes `&self`.
/// Symbols may be passed in any spelling the adapter's market table knows
/// (`BTC/USDT`, `BTC/USDT:USDT`, `BTCUSDT`).
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn is_testnet(&self) -> bool;

    /// Markets loaded at construction.
    fn markets(&self) -> &[MarketInfo];

    /// Resolve a market by any spelling.
    fn market(&self, symbol: &str) -> Option<&MarketInfo>;

    /// Account executions for one market, oldest first, from `since` (ms).
    async fn fetch_my_trades(&self, symbol: &str, since: Option<i64>, limit: u32) -> Result<Vec<Trade>>;

    async fn fetch_balance(&self) -> Result<BalanceSnapshot>;

    /// All position rows, including flat ones.
    async fn fetch_positions(&self) -> Result<Vec<PositionSnapshot>>;

    /// Open orders for one market, or all markets when `symbol` is `None`.
    async fn fetch_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>>;

    /// Balance ledger entries in `[since, until]`, oldest first.
    async fn fetch_income(&self, since: i64, until: i64) -> Result<Vec<IncomeEvent>>;

    /// Issue a key for the private account stream.
    async fn issue_stream_key(&self) -> Result<String>;

    async fn keepalive_stream_key(&self, key: &str) -> Result<()>;

    async fn close_stream_key(&self, key: &str) -> Result<()>;
}
