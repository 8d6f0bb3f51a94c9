//! Binance USDⓈ-M futures REST client (read-only).
//!
//! # REST endpoints
//!
//! | Operation          | Method | Path                     | Signed |
//! |--------------------|--------|--------------------------|--------|
//! | Server time        | GET    | `/fapi/v1/time`          | no     |
//! | Exchange info      | GET    | `/fapi/v1/exchangeInfo`  | no     |
//! | Account trades     | GET    | `/fapi/v1/userTrades`    | yes    |
//! | Account info       | GET    | `/fapi/v3/account`       | yes    |
//! | Positions          | GET    | `/fapi/v3/positionRisk`  | yes    |
//! | Open orders        | GET    | `/fapi/v1/openOrders`    | yes    |
//! | Income history     | GET    | `/fapi/v1/income`        | yes    |
//! | Create listen key  | POST   | `/fapi/v1/listenKey`     | key    |
//! | Refresh listen key | PUT    | `/fapi/v1/listenKey`     | key    |
//! | Close listen key   | DELETE | `/fapi/v1/listenKey`     | key    |
//!
//! Signed calls carry `timestamp` corrected by the cached server/local clock
//! offset, so a drifting host clock does not trip `recvWindow`.

use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::{Context, Result, anyhow};
use dash_core::time_util::now_ms;
use serde_json::Value;
use tracing::debug;

use super::auth;
use super::config::BinanceFuturesConfig;
use crate::rate_limiter::{RateLimiter, RateLimiterConfig};

/// Binance USDⓈ-M futures client bound to one API key.
pub struct FuturesClient {
    http: reqwest::Client,
    config: BinanceFuturesConfig,
    limiter: RateLimiter,
    /// `server_time - local_time` in ms, from [`sync_time`](Self::sync_time).
    time_offset: AtomicI64,
}

impl FuturesClient {
    pub fn new(config: BinanceFuturesConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        let limiter = RateLimiter::new(RateLimiterConfig::per_second(config.rate_limit_per_sec));
        Ok(Self { http, config, limiter, time_offset: AtomicI64::new(0) })
    }

    pub fn is_testnet(&self) -> bool {
        self.config.testnet
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// Fetch server time and cache the offset to the local clock.
    pub async fn sync_time(&self) -> Result<i64> {
        let before = now_ms();
        let body = self.public_get("/fapi/v1/time", &[]).await?;
        let after = now_ms();
        let server = body
            .get("serverTime")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("serverTime not found in response"))?;
        let offset = server - (before + after) / 2;
        self.time_offset.store(offset, Ordering::Relaxed);
        debug!("[binance] clock offset {offset}ms");
        Ok(offset)
    }

    /// Local clock corrected by the cached server offset.
    pub fn server_now(&self) -> i64 {
        now_ms() + self.time_offset.load(Ordering::Relaxed)
    }

    fn timestamp(&self) -> String {
        self.server_now().to_string()
    }

    // -----------------------------------------------------------------------
    // Request helpers
    // -----------------------------------------------------------------------

    async fn public_get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.limiter.acquire().await;
        let url = format!("{}{path}", self.config.rest_url);
        let resp = self.http.get(&url).query(params).send().await.with_context(|| format!("GET {path} failed"))?;
        read_json(resp, path).await
    }

    async fn signed_get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.limiter.acquire().await;
        let timestamp = self.timestamp();
        let recv_window = self.config.recv_window.to_string();
        let mut all: Vec<(&str, &str)> = params.to_vec();
        all.push(("recvWindow", &recv_window));
        all.push(("timestamp", &timestamp));

        let query = auth::build_signed_query(&all, &self.config.secret_key);
        let url = format!("{}{path}?{query}", self.config.rest_url);
        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .send()
            .await
            .with_context(|| format!("GET {path} failed"))?;
        read_json(resp, path).await
    }

    async fn listen_key_request(&self, method: reqwest::Method, key: Option<&str>) -> Result<Value> {
        self.limiter.acquire().await;
        let url = format!("{}/fapi/v1/listenKey", self.config.rest_url);
        let mut req = self.http.request(method.clone(), &url).header("X-MBX-APIKEY", &self.config.api_key);
        if let Some(key) = key {
            req = req.query(&[("listenKey", key)]);
        }
        let resp = req.send().await.with_context(|| format!("{method} listenKey failed"))?;
        read_json(resp, "/fapi/v1/listenKey").await
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn get_exchange_info(&self) -> Result<Value> {
        self.public_get("/fapi/v1/exchangeInfo", &[]).await
    }

    /// Account trade history for one market, oldest first.
    ///
    /// With `start_time` set the span up to `end_time` may not exceed seven
    /// days; without `end_time` the exchange caps it at seven days itself.
    pub async fn get_user_trades(
        &self,
        symbol: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: u32,
    ) -> Result<Value> {
        let limit = limit.to_string();
        let start = start_time.map(|t| t.to_string());
        let end = end_time.map(|t| t.to_string());
        let mut params: Vec<(&str, &str)> = vec![("symbol", symbol), ("limit", &limit)];
        if let Some(ref start) = start {
            params.push(("startTime", start));
        }
        if let Some(ref end) = end {
            params.push(("endTime", end));
        }
        self.signed_get("/fapi/v1/userTrades", &params).await
    }

    pub async fn get_account_info(&self) -> Result<Value> {
        self.signed_get("/fapi/v3/account", &[]).await
    }

    pub async fn get_positions(&self) -> Result<Value> {
        self.signed_get("/fapi/v3/positionRisk", &[]).await
    }

    /// Open orders, all markets when `symbol` is `None`.
    pub async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Value> {
        match symbol {
            Some(sym) => self.signed_get("/fapi/v1/openOrders", &[("symbol", sym)]).await,
            None => self.signed_get("/fapi/v1/openOrders", &[]).await,
        }
    }

    /// One page of income history in `[start_time, end_time]`, oldest first.
    pub async fn get_income(&self, start_time: i64, end_time: i64, limit: u32) -> Result<Value> {
        let start = start_time.to_string();
        let end = end_time.to_string();
        let limit = limit.to_string();
        self.signed_get("/fapi/v1/income", &[("startTime", &start), ("endTime", &end), ("limit", &limit)])
            .await
    }

    // -----------------------------------------------------------------------
    // Listen key management
    // -----------------------------------------------------------------------

    /// Create (or fetch the current) listen key for the user-data stream.
    pub async fn create_listen_key(&self) -> Result<String> {
        let body = self.listen_key_request(reqwest::Method::POST, None).await?;
        body.get("listenKey")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("listenKey not found in response"))
    }

    /// Extend the listen key's validity by 60 minutes.
    pub async fn keepalive_listen_key(&self, key: &str) -> Result<()> {
        self.listen_key_request(reqwest::Method::PUT, Some(key)).await?;
        debug!("[binance] listen key keepalive sent");
        Ok(())
    }

    pub async fn close_listen_key(&self, key: &str) -> Result<()> {
        self.listen_key_request(reqwest::Method::DELETE, Some(key)).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into an error carrying Binance's `{code,msg}`.
async fn read_json(resp: reqwest::Response, path: &str) -> Result<Value> {
    let status = resp.status();
    let text = resp.text().await.with_context(|| format!("{path}: failed to read body"))?;
    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| {
                let code = v.get("code")?.as_i64()?;
                let msg = v.get("msg")?.as_str()?.to_string();
                Some(format!("code {code}: {msg}"))
            })
            .unwrap_or(text);
        return Err(anyhow!("{path}: HTTP {status}: {detail}"));
    }
    serde_json::from_str(&text).with_context(|| format!("{path}: invalid JSON"))
}
