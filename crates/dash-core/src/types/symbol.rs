//! Symbol string helpers.
//!
//! Three spellings of the same market show up across the system:
//!
//! - unified symbol from the exchange adapter: `BTC/USDT:USDT`
//! - display pair shown on the dashboard: `BTC/USDT`
//! - compact market id used by the price streams: `BTCUSDT`

/// Drop the settlement suffix (everything from the first `:`).
///
/// `"BTC/USDT:USDT"` → `"BTC/USDT"`; strings without `:` are returned as-is.
#[inline]
pub fn display_pair(symbol: &str) -> &str {
    match symbol.find(':') {
        Some(idx) => &symbol[..idx],
        None => symbol,
    }
}

/// Compact, upper-cased key used to look up stream prices.
///
/// Removes `/` and `-` and any settlement suffix: `"btc/usdt:USDT"` → `"BTCUSDT"`.
pub fn stream_key(pair: &str) -> String {
    display_pair(pair)
        .chars()
        .filter(|c| *c != '/' && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Normalize a free-form asset filter for matching (`"BTC-USDT"` → `"btcusdt"`).
pub fn normalize_filter(filter: &str) -> String {
    filter
        .trim()
        .chars()
        .filter(|c| *c != '/' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
