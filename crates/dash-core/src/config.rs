//! Configuration parsing for the dashboard backend.
//!
//! Every binary reads its settings from a single JSON file. All sections and
//! fields have defaults, so `{}` is a valid config; secrets can be supplied
//! through environment variables instead of the file.
//!
//! # Example config
//!
//! ```json
//! {
//!   "service": { "module_name": "dashd", "log_path": "/var/log/dash" },
//!   "server": { "listen": "0.0.0.0:8080" },
//!   "store": { "url": "https://db.example.com", "anon_key": "..." },
//!   "exchange": { "recv_window_ms": 60000, "rate_limit_per_sec": 10 },
//!   "watchlist": { "trading_pairs": ["BTC/USDT", "ETH/USDT"] },
//!   "billing": { "public_origin": "https://app.example.com" }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Env var overriding [`StoreConfig::service_key`].
pub const ENV_STORE_SERVICE_KEY: &str = "DASH_STORE_SERVICE_KEY";
/// Env var overriding [`BillingConfig::secret_key`].
pub const ENV_BILLING_SECRET_KEY: &str = "DASH_BILLING_SECRET_KEY";
/// Env var overriding [`BillingConfig::webhook_secret`].
pub const ENV_BILLING_WEBHOOK_SECRET: &str = "DASH_BILLING_WEBHOOK_SECRET";

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub exchange: ExchangeConfig,
    pub watchlist: WatchlistConfig,
    pub billing: BillingConfig,
    pub live: LiveConfig,
}

// ---------------------------------------------------------------------------
// Service / server
// ---------------------------------------------------------------------------

/// Process metadata (name, logging).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub module_name: String,
    pub log_path: Option<String>,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { module_name: "dashd".into(), log_path: None, log_level: "info".into() }
    }
}

/// HTTP listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    /// Per-request timeout for the read endpoints.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { listen: "0.0.0.0:8080".into(), request_timeout_secs: 120 }
    }
}

// ---------------------------------------------------------------------------
// Hosted auth/database
// ---------------------------------------------------------------------------

/// Hosted auth + database REST endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Project base URL (`/auth/v1` and `/rest/v1` are appended).
    pub url: String,
    /// Public key sent as `apikey` on every request.
    pub anon_key: String,
    /// Privileged key for profile reads/writes made without a user session
    /// (payment webhooks).
    pub service_key: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { url: "http://localhost:54321".into(), anon_key: String::new(), service_key: None }
    }
}

// ---------------------------------------------------------------------------
// Exchange access
// ---------------------------------------------------------------------------

/// Exchange endpoints and client tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub rest_url: String,
    pub rest_testnet_url: String,
    /// Base for private user-data streams (`{base}/{listenKey}`).
    pub user_ws_url: String,
    pub user_ws_testnet_url: String,
    /// Public market-wide mark price stream.
    pub market_ws_url: String,
    pub recv_window_ms: u64,
    pub request_timeout_secs: u64,
    pub rate_limit_per_sec: u32,
    /// Listen key keepalive period.
    pub listen_key_refresh_secs: u64,
    /// Lifetime of pooled per-connection clients.
    pub client_ttl_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: "https://fapi.binance.com".into(),
            rest_testnet_url: "https://testnet.binancefuture.com".into(),
            user_ws_url: "wss://fstream.binance.com/ws".into(),
            user_ws_testnet_url: "wss://stream.binancefuture.com/ws".into(),
            market_ws_url: "wss://fstream.binance.com/ws/!markPrice@arr@1s".into(),
            recv_window_ms: 60_000,
            request_timeout_secs: 30,
            rate_limit_per_sec: 10,
            listen_key_refresh_secs: 1_800,
            client_ttl_secs: 600,
        }
    }
}

impl ExchangeConfig {
    pub fn rest_base(&self, testnet: bool) -> &str {
        if testnet { &self.rest_testnet_url } else { &self.rest_url }
    }

    pub fn user_stream_url(&self, testnet: bool, listen_key: &str) -> String {
        let base = if testnet { &self.user_ws_testnet_url } else { &self.user_ws_url };
        format!("{}/{}", base.trim_end_matches('/'), listen_key)
    }
}

// ---------------------------------------------------------------------------
// Watch lists
// ---------------------------------------------------------------------------

fn pairs(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Fixed pair lists the fan-out fetchers iterate over.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchlistConfig {
    pub quick_stats_pairs: Vec<String>,
    pub quick_stats_limit: u32,
    /// Also the fallback set for portfolio history.
    pub recent_trades_pairs: Vec<String>,
    pub recent_trades_limit: u32,
    /// Open orders, realized PnL, daily PnL and sync.
    pub trading_pairs: Vec<String>,
    pub realized_limit: u32,
    /// Page size for paginated history (daily PnL, sync).
    pub page_size: u32,
    /// Stablecoin assets summed into balances.
    pub quote_assets: Vec<String>,
    /// Sync lookback when nothing is persisted yet.
    pub sync_lookback_days: i64,
    /// Maximum rows returned by recent trades.
    pub recent_trades_max: usize,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            quick_stats_pairs: pairs(&[
                "BTC/USDT", "ETH/USDT", "SOL/USDT", "BNB/USDT", "XRP/USDT", "BTC/USDC", "ETH/USDC",
            ]),
            quick_stats_limit: 100,
            recent_trades_pairs: pairs(&["BTC/USDT", "ETH/USDT", "SOL/USDT", "BTC/USDC", "ETH/USDC"]),
            recent_trades_limit: 20,
            trading_pairs: pairs(&[
                "BTC/USDT", "ETH/USDT", "SOL/USDT", "BNB/USDT", "XRP/USDT", "DOGE/USDT", "ADA/USDT",
                "AVAX/USDT", "LINK/USDT", "MATIC/USDT", "DOT/USDT", "LTC/USDT", "SHIB/USDT",
                "TRX/USDT", "BTC/USDC", "ETH/USDC", "SOL/USDC", "BNB/USDC",
            ]),
            realized_limit: 50,
            page_size: 50,
            quote_assets: pairs(&["USDT", "USDC"]),
            sync_lookback_days: 365,
            recent_trades_max: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Billing
// ---------------------------------------------------------------------------

/// Payment provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub api_url: String,
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    /// Maximum age of a signed webhook timestamp.
    pub webhook_tolerance_secs: i64,
    /// Public origin of the dashboard (checkout/portal redirect targets).
    pub public_origin: String,
    /// Price catalog keyed `{TIER}_{MONTHLY|YEARLY}`.
    pub prices: HashMap<String, String>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        let prices = [
            ("A1_MONTHLY", "price_1So1nKCX3wuf0Ms8yHcwLfbL"),
            ("A2_MONTHLY", "price_1SnLoCCX3wuf0Ms8bYWtK9BP"),
            ("A3_MONTHLY", "price_1SnLpwCX3wuf0Ms89rfUI0iA"),
            ("A4_MONTHLY", "price_1SnLqCCX3wuf0Ms8XfATKTbg"),
            ("A1_YEARLY", "price_1SnNDbCX3wuf0Ms8QjmO5o84"),
            ("A2_YEARLY", "price_1SnNEhCX3wuf0Ms8fWT3Hnbo"),
            ("A3_YEARLY", "price_1SnNFkCX3wuf0Ms8VpcwjJzU"),
            ("A4_YEARLY", "price_1SnNGMCX3wuf0Ms8kmhe7YRv"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            api_url: "https://api.stripe.com".into(),
            secret_key: None,
            webhook_secret: None,
            webhook_tolerance_secs: 300,
            public_origin: "http://localhost:3000".into(),
            prices,
        }
    }
}

// ---------------------------------------------------------------------------
// Live session
// ---------------------------------------------------------------------------

/// Reconnect tuning for the live position streams.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    /// Channel capacity between stream tasks and the position book.
    pub event_buffer: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self { backoff_initial_ms: 100, backoff_max_ms: 30_000, event_buffer: 1024 }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and parse a JSON config file, then apply environment overrides.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let mut config: AppConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

impl AppConfig {
    /// Overlay secrets from the environment. `lookup` is injectable for tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty(ENV_STORE_SERVICE_KEY) {
            self.store.service_key = Some(v);
        }
        if let Some(v) = non_empty(ENV_BILLING_SECRET_KEY) {
            self.billing.secret_key = Some(v);
        }
        if let Some(v) = non_empty(ENV_BILLING_WEBHOOK_SECRET) {
            self.billing.webhook_secret = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_valid() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.exchange.recv_window_ms, 60_000);
        assert_eq!(config.watchlist.trading_pairs.len(), 18);
        assert_eq!(config.watchlist.quick_stats_pairs.len(), 7);
        assert_eq!(config.watchlist.recent_trades_pairs.len(), 5);
        assert_eq!(config.billing.prices.len(), 8);
        assert_eq!(config.service.module_name, "dashd");
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"exchange":{"rate_limit_per_sec":3},"watchlist":{"page_size":10}}"#)
                .unwrap();
        assert_eq!(config.exchange.rate_limit_per_sec, 3);
        assert_eq!(config.exchange.request_timeout_secs, 30);
        assert_eq!(config.watchlist.page_size, 10);
        assert_eq!(config.watchlist.realized_limit, 50);
    }

    #[test]
    fn env_overrides_secrets() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            ENV_BILLING_WEBHOOK_SECRET => Some("whsec_test".into()),
            ENV_STORE_SERVICE_KEY => Some("  ".into()),
            _ => None,
        });
        assert_eq!(config.billing.webhook_secret.as_deref(), Some("whsec_test"));
        assert_eq!(config.store.service_key, None);
    }

    #[test]
    fn user_stream_url_by_network() {
        let ex = ExchangeConfig::default();
        assert_eq!(ex.user_stream_url(false, "abc"), "wss://fstream.binance.com/ws/abc");
        assert_eq!(ex.user_stream_url(true, "abc"), "wss://stream.binancefuture.com/ws/abc");
        assert_eq!(ex.rest_base(true), "https://testnet.binancefuture.com");
    }
}
