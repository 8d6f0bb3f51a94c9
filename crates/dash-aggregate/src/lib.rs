//! # dash-aggregate
//!
//! Server-side aggregation behind every dashboard panel.
//!
//! Each operation follows the same shape: resolve the caller's active
//! connections, build (or reuse) an exchange adapter per connection, fan out
//! per-symbol requests over a configured watch list, drop whatever fails and
//! merge the rest into a plain result value. A missing session or a user
//! without connections yields the zero value of the result, never an error.
//!
//! | Operation                          | Module      |
//! |------------------------------------|-------------|
//! | quick stats, recent trades, realized PnL | [`stats`] |
//! | account data, open orders          | [`account`] |
//! | daily PnL buckets                  | [`daily`]   |
//! | portfolio history                  | [`history`] |
//! | trade sync                         | [`sync`]    |
//! | stream key issue/keepalive/close   | [`stream`]  |

pub mod account;
pub mod connections;
pub mod daily;
pub mod fanout;
pub mod history;
pub mod normalize;
pub mod pager;
pub mod stats;
pub mod stream;
pub mod sync;

use std::sync::Arc;

use dash_core::config::WatchlistConfig;
use dash_core::time_util::now_ms;
use dash_exchange::Connector;
use dash_store::{ConnectionStore, SessionResolver, TradeStore};

pub use connections::ConnectedAccount;

/// Source of "now" in ms. Replaced in tests to pin calendar buckets.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Entry point for all aggregation operations.
///
/// Holds no per-request state; share one instance behind an `Arc`.
pub struct Aggregator {
    sessions: Arc<dyn SessionResolver>,
    connections: Arc<dyn ConnectionStore>,
    trades: Arc<dyn TradeStore>,
    connector: Arc<dyn Connector>,
    watchlist: WatchlistConfig,
    clock: Clock,
}

impl Aggregator {
    /// `store` provides sessions, connections and trade persistence.
    pub fn new<S>(store: Arc<S>, connector: Arc<dyn Connector>, watchlist: WatchlistConfig) -> Self
    where
        S: SessionResolver + ConnectionStore + TradeStore + 'static,
    {
        Self {
            sessions: store.clone(),
            connections: store.clone(),
            trades: store,
            connector,
            watchlist,
            clock: Arc::new(now_ms),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn watchlist(&self) -> &WatchlistConfig {
        &self.watchlist
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }
}
