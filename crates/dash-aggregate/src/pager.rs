//! Forward pagination over account trade history.

use anyhow::Result;
use dash_core::types::Trade;
use dash_exchange::ExchangeAdapter;

/// Walks `fetch_my_trades` forward from a start time.
///
/// The cursor moves to `last timestamp + 1` after each page. Paging ends on
/// an empty page, a short page, or a page whose last timestamp does not move
/// past the cursor.
pub struct TradePager<'a> {
    adapter: &'a dyn ExchangeAdapter,
    symbol: &'a str,
    cursor: i64,
    page_size: u32,
    done: bool,
}

impl<'a> TradePager<'a> {
    pub fn new(adapter: &'a dyn ExchangeAdapter, symbol: &'a str, since: i64, page_size: u32) -> Self {
        Self { adapter, symbol, cursor: since, page_size: page_size.max(1), done: false }
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Next non-empty page, or `None` once exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Trade>>> {
        if self.done {
            return Ok(None);
        }
        let page = self.adapter.fetch_my_trades(self.symbol, Some(self.cursor), self.page_size).await?;
        let Some(last) = page.last() else {
            self.done = true;
            return Ok(None);
        };
        if last.timestamp > self.cursor {
            self.cursor = last.timestamp + 1;
        } else {
            self.done = true;
        }
        if page.len() < self.page_size as usize {
            self.done = true;
        }
        Ok(Some(page))
    }

    /// Drain every page. A failure after the first page keeps what was
    /// already read and is returned alongside it.
    pub async fn collect(mut self) -> (Vec<Trade>, Option<anyhow::Error>) {
        let mut all = Vec::new();
        loop {
            match self.next_page().await {
                Ok(Some(page)) => all.extend(page),
                Ok(None) => return (all, None),
                Err(e) => return (all, Some(e)),
            }
        }
    }
}
