//! In-memory position table merged from the two live feeds.
//!
//! [`PositionBook`] is plain state; [`run_book`] owns one inside a task and
//! publishes a fresh snapshot after every change. Prices and position deltas
//! arrive on separate channels so a burst on one feed never blocks the other.

use ahash::AHashMap;
use dash_aggregate::normalize::pnl_percent;
use dash_core::types::symbol::stream_key;
use dash_core::types::{PositionItem, PositionSide};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::parser::{LiveEvent, PositionDelta};

/// Messages accepted by the book task.
#[derive(Debug, Clone)]
pub enum BookCommand {
    /// Replace every position (initial load and after a reconnect).
    Seed(Vec<PositionItem>),
    /// Account update from the private feed of `connection_id`.
    Delta { connection_id: String, delta: PositionDelta },
}

#[derive(Debug, Default)]
pub struct PositionBook {
    /// Keyed by position id (`{connection}-{symbol}`), so two connections
    /// holding the same market stay separate rows.
    positions: AHashMap<String, PositionItem>,
    /// Keyed by compact market id (`BTCUSDT`).
    prices: AHashMap<String, f64>,
}

fn owned_by(id: &str, connection_id: &str) -> bool {
    id.strip_prefix(connection_id).is_some_and(|rest| rest.starts_with('-'))
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, items: Vec<PositionItem>) {
        self.positions = items.into_iter().map(|p| (p.id.clone(), p)).collect();
    }

    /// Record a mark price. Returns whether any held position trades that
    /// market.
    pub fn apply_price(&mut self, symbol: &str, price: f64) -> bool {
        let key = stream_key(symbol);
        let held = self.positions.values().any(|p| stream_key(&p.symbol) == key);
        self.prices.insert(key, price);
        held
    }

    /// Merge an account update into the position `connection_id` holds in
    /// that market; other connections' rows are never touched.
    pub fn apply_delta(&mut self, connection_id: &str, delta: &PositionDelta) {
        let key = stream_key(&delta.symbol);
        let held = self
            .positions
            .iter()
            .find(|(id, p)| owned_by(id, connection_id) && stream_key(&p.symbol) == key)
            .map(|(id, _)| id.clone());

        if delta.amount == 0.0 {
            if let Some(id) = held {
                self.positions.remove(&id);
                debug!("[live] {id} closed");
            }
            return;
        }
        let side = PositionSide::from_signed(delta.amount);
        let id = held.unwrap_or_else(|| format!("{connection_id}-{key}"));
        let entry = self.positions.entry(id.clone()).or_insert_with(|| PositionItem {
            id,
            pair: key.clone(),
            symbol: key.clone(),
            side,
            entry_price: delta.entry_price,
            current_price: delta.entry_price,
            size: 0.0,
            pnl: 0.0,
            pnl_percent: 0.0,
        });
        entry.side = side;
        entry.size = delta.amount.abs();
        if delta.entry_price > 0.0 {
            entry.entry_price = delta.entry_price;
        }
        if let Some(up) = delta.unrealized_pnl {
            entry.pnl = up;
        }
    }

    /// Positions with PnL derived from the latest mark price where one is
    /// known; otherwise the last reported values are kept.
    pub fn snapshot(&self) -> Vec<PositionItem> {
        let mut out: Vec<PositionItem> = self
            .positions
            .values()
            .map(|pos| {
                let mut pos = pos.clone();
                if let Some(&price) = self.prices.get(&stream_key(&pos.symbol)) {
                    pos.current_price = price;
                    pos.pnl = pos.side.signed((price - pos.entry_price) * pos.size);
                    pos.pnl_percent = pnl_percent(pos.side, pos.entry_price, price, None);
                }
                pos
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Drain both channels into a book until both senders are gone.
///
/// A price tick only republishes when it touches a held position.
pub async fn run_book(
    mut prices: mpsc::Receiver<LiveEvent>,
    mut updates: mpsc::UnboundedReceiver<BookCommand>,
    snapshots: watch::Sender<Vec<PositionItem>>,
) {
    let mut book = PositionBook::new();
    let mut prices_open = true;
    let mut updates_open = true;

    while prices_open || updates_open {
        let changed = tokio::select! {
            cmd = updates.recv(), if updates_open => match cmd {
                Some(BookCommand::Seed(items)) => {
                    info!("[live] seeded {} positions", items.len());
                    book.seed(items);
                    true
                }
                Some(BookCommand::Delta { connection_id, delta }) => {
                    book.apply_delta(&connection_id, &delta);
                    true
                }
                None => {
                    updates_open = false;
                    false
                }
            },
            event = prices.recv(), if prices_open => match event {
                Some(LiveEvent::Price { symbol, price }) => book.apply_price(&symbol, price),
                Some(_) => false,
                None => {
                    prices_open = false;
                    false
                }
            },
        };
        if changed {
            snapshots.send_replace(book.snapshot());
        }
    }
    debug!("[live] book task finished");
}
