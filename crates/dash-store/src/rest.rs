//! Hosted auth/database over its REST API.
//!
//! # Endpoints
//!
//! | Operation          | Method | Path                                   | Auth         |
//! |--------------------|--------|----------------------------------------|--------------|
//! | Current user       | GET    | `/auth/v1/user`                        | user token   |
//! | Active connections | GET    | `/rest/v1/user_exchange_connections`   | user token   |
//! | Latest trade       | GET    | `/rest/v1/trades`                      | user token   |
//! | Insert trades      | POST   | `/rest/v1/trades?on_conflict=...`      | user token   |
//! | Read profile       | GET    | `/rest/v1/user_profiles`               | service key  |
//! | Update profile     | PATCH  | `/rest/v1/user_profiles`               | service key  |

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use dash_core::config::StoreConfig;
use dash_core::error::DashError;
use dash_core::time_util::parse_rfc3339_ms;
use dash_core::types::{ExchangeConnection, User};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{ProfileUpdate, Session, TradeRow, UserProfile};
use crate::{ConnectionStore, ProfileStore, SessionResolver, TradeStore};

const TRADE_CONFLICT_KEY: &str = "trading_account_id,exchange_order_id";

/// REST client for the hosted service.
pub struct RestStore {
    http: reqwest::Client,
    base: String,
    anon_key: String,
    service_key: Option<String>,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_key: config.service_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Attach `apikey` and the bearer the row-level policies check.
    fn authorized(&self, req: RequestBuilder, bearer: &str) -> RequestBuilder {
        req.header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    fn service_bearer(&self) -> Result<&str> {
        self.service_key
            .as_deref()
            .ok_or_else(|| DashError::Config("store service key is not configured".into()).into())
    }

    fn service_request(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let key = self.service_bearer()?;
        Ok(req.header("apikey", key).bearer_auth(key))
    }
}

async fn read_rows(resp: reqwest::Response, what: &str) -> Result<Vec<Value>> {
    let status = resp.status();
    let body = resp.text().await.with_context(|| format!("{what}: failed to read body"))?;
    if !status.is_success() {
        return Err(DashError::Store(format!("{what}: HTTP {status}: {body}")).into());
    }
    serde_json::from_str(&body).with_context(|| format!("{what}: invalid JSON"))
}

async fn expect_success(resp: reqwest::Response, what: &str) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(DashError::Store(format!("{what}: HTTP {status}: {body}")).into())
}

#[async_trait]
impl SessionResolver for RestStore {
    async fn resolve(&self, token: &str) -> Result<Option<Session>> {
        if token.is_empty() {
            return Ok(None);
        }
        let resp = self
            .authorized(self.http.get(self.url("/auth/v1/user")), token)
            .send()
            .await
            .context("GET /auth/v1/user failed")?;
        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("[store] token rejected");
                return Ok(None);
            }
            s if !s.is_success() => {
                return Err(DashError::Store(format!("/auth/v1/user: HTTP {s}")).into());
            }
            _ => {}
        }
        let user: User = resp.json().await.context("invalid user payload")?;
        Ok(Some(Session { user, token: token.to_string() }))
    }
}

#[async_trait]
impl ConnectionStore for RestStore {
    async fn active_connections(&self, session: &Session) -> Result<Vec<ExchangeConnection>> {
        let user_filter = format!("eq.{}", session.user.id);
        let req = self
            .http
            .get(self.url("/rest/v1/user_exchange_connections"))
            .query(&[("select", "*"), ("user_id", user_filter.as_str()), ("is_active", "eq.true")]);
        let resp = self.authorized(req, &session.token).send().await.context("GET connections failed")?;

        let mut conns = Vec::new();
        for row in read_rows(resp, "user_exchange_connections").await? {
            match serde_json::from_value::<ExchangeConnection>(row) {
                // The filter is server-side; re-check in case a policy widens it.
                Ok(conn) if conn.is_active => conns.push(conn),
                Ok(_) => {}
                Err(e) => warn!("[store] skipping malformed connection row: {e}"),
            }
        }
        Ok(conns)
    }
}

#[async_trait]
impl TradeStore for RestStore {
    async fn latest_opened_at(&self, session: &Session, account_id: &str) -> Result<Option<i64>> {
        let user_filter = format!("eq.{}", session.user.id);
        let account_filter = format!("eq.{account_id}");
        let req = self.http.get(self.url("/rest/v1/trades")).query(&[
            ("select", "opened_at"),
            ("user_id", user_filter.as_str()),
            ("trading_account_id", account_filter.as_str()),
            ("order", "opened_at.desc"),
            ("limit", "1"),
        ]);
        let resp = self.authorized(req, &session.token).send().await.context("GET trades failed")?;
        let rows = read_rows(resp, "trades").await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("opened_at"))
            .and_then(Value::as_str)
            .and_then(parse_rfc3339_ms))
    }

    async fn upsert_trades(&self, session: &Session, rows: &[TradeRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let req = self
            .http
            .post(self.url("/rest/v1/trades"))
            .query(&[("on_conflict", TRADE_CONFLICT_KEY)])
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(rows);
        let resp = self.authorized(req, &session.token).send().await.context("POST trades failed")?;
        expect_success(resp, "trades upsert").await
    }
}

#[async_trait]
impl ProfileStore for RestStore {
    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let id_filter = format!("eq.{user_id}");
        let req = self
            .http
            .get(self.url("/rest/v1/user_profiles"))
            .query(&[("select", "*"), ("id", id_filter.as_str())]);
        let resp = self.service_request(req)?.send().await.context("GET user_profiles failed")?;
        let rows = read_rows(resp, "user_profiles").await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row).context("invalid profile row")?)),
            None => Ok(None),
        }
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<()> {
        let id_filter = format!("eq.{user_id}");
        let req = self
            .http
            .patch(self.url("/rest/v1/user_profiles"))
            .query(&[("id", id_filter.as_str())])
            .header("Prefer", "return=minimal")
            .json(&update.to_patch());
        let resp = self.service_request(req)?.send().await.context("PATCH user_profiles failed")?;
        expect_success(resp, "user_profiles update")
            .await
            .map_err(|e| anyhow!("profile {user_id}: {e}"))
    }
}
