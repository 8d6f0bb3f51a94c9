//! Bidirectional symbol mapping between Binance market ids and unified
//! symbols.
//!
//! Binance USDⓈ-M futures use concatenated ids (`BTCUSDT`), the rest of the
//! system uses the unified `BASE/QUOTE:SETTLE` form (`BTC/USDT:USDT`) and the
//! dashboard shows `BASE/QUOTE`. The mapper answers lookups by any of the
//! three spellings once it has been loaded from `exchangeInfo`.

use ahash::AHashMap;
use dash_core::types::MarketInfo;
use dash_core::types::symbol::display_pair;

/// Market table keyed by id, unified symbol and display pair.
#[derive(Debug, Clone, Default)]
pub struct SymbolMapper {
    markets: Vec<MarketInfo>,
    /// `BTCUSDT` → index.
    by_id: AHashMap<String, usize>,
    /// `BTC/USDT:USDT` and `BTC/USDT` → index.
    by_symbol: AHashMap<String, usize>,
}

impl SymbolMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_markets(markets: Vec<MarketInfo>) -> Self {
        let mut mapper = Self::new();
        for market in markets {
            mapper.add_market(market);
        }
        mapper
    }

    /// Add one market. A later market with the same id replaces the lookup.
    pub fn add_market(&mut self, market: MarketInfo) {
        let idx = self.markets.len();
        self.by_id.insert(market.id.clone(), idx);
        self.by_symbol.insert(market.symbol.clone(), idx);
        self.by_symbol.entry(display_pair(&market.symbol).to_string()).or_insert(idx);
        self.markets.push(market);
    }

    /// Resolve a market by id (`BTCUSDT`), unified symbol or display pair.
    pub fn resolve(&self, any: &str) -> Option<&MarketInfo> {
        self.by_symbol
            .get(any)
            .or_else(|| self.by_id.get(any))
            .map(|&idx| &self.markets[idx])
    }

    /// Unified symbol for a market id; the id itself when unknown.
    pub fn to_unified<'a>(&'a self, id: &'a str) -> &'a str {
        self.by_id.get(id).map(|&idx| self.markets[idx].symbol.as_str()).unwrap_or(id)
    }

    /// Market id for any spelling; `None` when unknown.
    pub fn to_exchange(&self, any: &str) -> Option<&str> {
        self.resolve(any).map(|m| m.id.as_str())
    }

    pub fn markets(&self) -> &[MarketInfo] {
        &self.markets
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(id: &str, base: &str, quote: &str) -> MarketInfo {
        MarketInfo {
            id: id.into(),
            symbol: format!("{base}/{quote}:{quote}"),
            base: base.into(),
            quote: quote.into(),
            settle: quote.into(),
        }
    }

    #[test]
    fn resolves_all_spellings() {
        let mapper = SymbolMapper::from_markets(vec![
            market("BTCUSDT", "BTC", "USDT"),
            market("ETHUSDC", "ETH", "USDC"),
        ]);
        assert_eq!(mapper.to_exchange("BTC/USDT"), Some("BTCUSDT"));
        assert_eq!(mapper.to_exchange("BTC/USDT:USDT"), Some("BTCUSDT"));
        assert_eq!(mapper.to_exchange("ETHUSDC"), Some("ETHUSDC"));
        assert_eq!(mapper.to_unified("ETHUSDC"), "ETH/USDC:USDC");
        assert_eq!(mapper.len(), 2);
    }

    #[test]
    fn unknown_symbol() {
        let mapper = SymbolMapper::from_markets(vec![market("BTCUSDT", "BTC", "USDT")]);
        assert_eq!(mapper.to_exchange("MATIC/USDT"), None);
        assert_eq!(mapper.to_unified("FOOUSDT"), "FOOUSDT");
    }
}
