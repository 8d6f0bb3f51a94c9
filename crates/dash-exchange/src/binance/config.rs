//! Per-connection Binance client configuration.
//!
//! Built from the shared [`ExchangeConfig`] plus one stored connection's
//! credentials and testnet flag.

use std::time::Duration;

use dash_core::config::ExchangeConfig;

/// Settings for one [`FuturesClient`](super::futures::FuturesClient).
#[derive(Debug, Clone)]
pub struct BinanceFuturesConfig {
    pub api_key: String,
    pub secret_key: String,
    /// REST base (mainnet or testnet).
    pub rest_url: String,
    pub testnet: bool,
    /// `recvWindow` for signed requests (ms).
    pub recv_window: u64,
    pub request_timeout: Duration,
    pub rate_limit_per_sec: u32,
}

impl BinanceFuturesConfig {
    pub fn new(exchange: &ExchangeConfig, api_key: &str, secret_key: &str, testnet: bool) -> Self {
        Self {
            api_key: api_key.to_string(),
            secret_key: secret_key.to_string(),
            rest_url: exchange.rest_base(testnet).trim_end_matches('/').to_string(),
            testnet,
            recv_window: exchange.recv_window_ms,
            request_timeout: Duration::from_secs(exchange.request_timeout_secs),
            rate_limit_per_sec: exchange.rate_limit_per_sec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testnet_routing() {
        let ex = ExchangeConfig::default();
        let main = BinanceFuturesConfig::new(&ex, "k", "s", false);
        let test = BinanceFuturesConfig::new(&ex, "k", "s", true);
        assert_eq!(main.rest_url, "https://fapi.binance.com");
        assert_eq!(test.rest_url, "https://testnet.binancefuture.com");
        assert_eq!(main.recv_window, 60_000);
        assert_eq!(main.request_timeout, Duration::from_secs(30));
    }
}
