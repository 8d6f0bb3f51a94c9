//! Enumerations used throughout the dashboard backend.
//!
//! Exchange platforms, order/position sides and the portfolio-history
//! timeframes. String forms match what the hosted database and the dashboard
//! front end exchange over JSON.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DashError;

// ---------------------------------------------------------------------------
// Exchange platforms
// ---------------------------------------------------------------------------

/// Exchange platform stored on a connection row (`exchange_platform`).
///
/// Only [`Platform::Binance`] has an adapter today. Unknown strings are kept
/// in [`Platform::Other`] so a row is never rejected while loading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    Binance,
    Bybit,
    Other(String),
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Binance => "binance",
            Self::Bybit => "bybit",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "binance" => Self::Binance,
            "bybit" => Self::Bybit,
            _ => Self::Other(value),
        }
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sides
// ---------------------------------------------------------------------------

/// Buy or sell side of an execution or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse an exchange side string (`"BUY"`, `"sell"`, ...). Anything that
    /// is not a sell is treated as a buy.
    pub fn from_exchange(s: &str) -> Self {
        if s.eq_ignore_ascii_case("sell") { Self::Sell } else { Self::Buy }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Side implied by a signed position amount (`> 0` long, otherwise short).
    #[inline]
    pub fn from_signed(amount: f64) -> Self {
        if amount > 0.0 { Self::Long } else { Self::Short }
    }

    /// Apply the side's sign to a raw long-oriented quantity.
    #[inline]
    pub fn signed(self, raw: f64) -> f64 {
        match self {
            Self::Long => raw,
            Self::Short => -raw,
        }
    }
}

// ---------------------------------------------------------------------------
// Portfolio timeframe
// ---------------------------------------------------------------------------

/// Lookback window for the portfolio history chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[default]
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "1Y")]
    OneYear,
}

impl Timeframe {
    pub const ALL: [Timeframe; 5] =
        [Self::OneDay, Self::OneWeek, Self::OneMonth, Self::ThreeMonths, Self::OneYear];

    /// Window length in days.
    pub fn days(self) -> i64 {
        match self {
            Self::OneDay => 1,
            Self::OneWeek => 7,
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::OneYear => 365,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1D",
            Self::OneWeek => "1W",
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::OneYear => "1Y",
        }
    }
}

impl FromStr for Timeframe {
    type Err = DashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DashError::Parse(format!("unknown timeframe: {s}")))
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_from_db_string() {
        assert_eq!(Platform::from("Binance".to_string()), Platform::Binance);
        assert_eq!(Platform::from("kraken".to_string()), Platform::Other("kraken".into()));
        let json = serde_json::to_string(&Platform::Binance).unwrap();
        assert_eq!(json, "\"binance\"");
    }

    #[test]
    fn position_side_sign() {
        assert_eq!(PositionSide::from_signed(0.5), PositionSide::Long);
        assert_eq!(PositionSide::from_signed(-0.5), PositionSide::Short);
        assert_eq!(PositionSide::Short.signed(2.0), -2.0);
    }

    #[test]
    fn timeframe_parse() {
        assert_eq!("3m".parse::<Timeframe>().unwrap(), Timeframe::ThreeMonths);
        assert_eq!("1Y".parse::<Timeframe>().unwrap().days(), 365);
        assert!("2W".parse::<Timeframe>().is_err());
        assert_eq!(serde_json::to_string(&Timeframe::OneWeek).unwrap(), "\"1W\"");
    }
}
