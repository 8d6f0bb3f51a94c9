//! Exchange records → dashboard rows.

use dash_core::time_util::{display_time, group_thousands};
use dash_core::types::symbol::display_pair;
use dash_core::types::{
    Order, OrderItem, PositionItem, PositionSide, PositionSnapshot, QuickStats, Trade, TradeItem,
};

/// PnL percent of a position: the reported value unless it is missing or
/// zero, in which case the raw price move is used, sign-flipped for shorts.
pub fn pnl_percent(side: PositionSide, entry: f64, current: f64, reported: Option<f64>) -> f64 {
    match reported {
        Some(p) if p != 0.0 && p.is_finite() => p,
        _ if entry != 0.0 && current != 0.0 => side.signed((current - entry) / entry * 100.0),
        _ => 0.0,
    }
}

/// Open position row, or `None` for a flat position.
pub fn position_item(connection_id: &str, pos: &PositionSnapshot) -> Option<PositionItem> {
    if pos.signed_amount == 0.0 {
        return None;
    }
    let side = PositionSide::from_signed(pos.signed_amount);
    let current_price = pos.mark_price.or(pos.last_price).unwrap_or(0.0);
    Some(PositionItem {
        id: format!("{connection_id}-{}", pos.symbol),
        pair: display_pair(&pos.symbol).to_string(),
        symbol: pos.market_id.clone(),
        side,
        entry_price: pos.entry_price,
        current_price,
        size: pos.signed_amount.abs(),
        pnl: pos.unrealized_pnl,
        pnl_percent: pnl_percent(side, pos.entry_price, current_price, pos.percentage),
    })
}

pub fn trade_item(trade: &Trade) -> TradeItem {
    TradeItem {
        id: trade.id.clone(),
        side: trade.side,
        pair: display_pair(&trade.symbol).to_string(),
        amount: trade.amount,
        price: trade.price,
        time: display_time(trade.timestamp),
        profit: trade.realized_pnl,
        timestamp: trade.timestamp,
    }
}

pub fn order_item(order: &Order) -> OrderItem {
    OrderItem {
        id: order.id.clone(),
        pair: display_pair(&order.symbol).to_string(),
        order_type: order.order_type.clone(),
        side: order.side,
        price: order.price,
        amount: order.amount,
        filled: order.filled,
        status: order.status.clone(),
        time: display_time(order.timestamp),
        timestamp: order.timestamp,
    }
}

/// Running win/loss tally over realized PnL values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WinTally {
    pub closed: u64,
    pub wins: u64,
    pub best: Option<f64>,
}

impl WinTally {
    /// Count one execution; zero PnL (opening fills) is ignored.
    pub fn record(&mut self, pnl: f64) {
        if pnl == 0.0 {
            return;
        }
        self.closed += 1;
        if pnl > 0.0 {
            self.wins += 1;
        }
        self.best = Some(self.best.map_or(pnl, |b| b.max(pnl)));
    }

    pub fn merge(&mut self, other: WinTally) {
        self.closed += other.closed;
        self.wins += other.wins;
        if let Some(b) = other.best {
            self.best = Some(self.best.map_or(b, |cur| cur.max(b)));
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.closed == 0 { 0.0 } else { self.wins as f64 / self.closed as f64 * 100.0 }
    }

    pub fn to_stats(self) -> QuickStats {
        QuickStats {
            win_rate: format!("{:.2}%", self.win_rate()),
            total_trades: group_thousands(self.closed),
            best_trade: format!("${:.2}", self.best.unwrap_or(0.0)),
        }
    }
}
