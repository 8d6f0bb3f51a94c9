//! In-process store used by tests and the offline CLI.

use ahash::AHashMap;
use anyhow::Result;
use async_trait::async_trait;
use dash_core::time_util::parse_rfc3339_ms;
use dash_core::types::{ExchangeConnection, User};
use tokio::sync::RwLock;

use crate::model::{ProfileUpdate, Session, TradeRow, UserProfile};
use crate::{ConnectionStore, ProfileStore, SessionResolver, TradeStore};

#[derive(Default)]
struct Tables {
    tokens: AHashMap<String, User>,
    connections: Vec<ExchangeConnection>,
    trades: Vec<TradeRow>,
    profiles: AHashMap<String, UserProfile>,
}

/// All four store traits over plain in-memory tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` as a valid session of `user`.
    pub fn with_user(mut self, token: &str, user: User) -> Self {
        self.tables.get_mut().tokens.insert(token.to_string(), user);
        self
    }

    pub fn with_connection(mut self, conn: ExchangeConnection) -> Self {
        self.tables.get_mut().connections.push(conn);
        self
    }

    pub fn with_trade(mut self, row: TradeRow) -> Self {
        self.tables.get_mut().trades.push(row);
        self
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.tables.get_mut().profiles.insert(profile.id.clone(), profile);
        self
    }

    /// Snapshot of the persisted trade rows.
    pub async fn trades(&self) -> Vec<TradeRow> {
        self.tables.read().await.trades.clone()
    }
}

#[async_trait]
impl SessionResolver for MemoryStore {
    async fn resolve(&self, token: &str) -> Result<Option<Session>> {
        if token.is_empty() {
            return Ok(None);
        }
        let tables = self.tables.read().await;
        Ok(tables
            .tokens
            .get(token)
            .map(|user| Session { user: user.clone(), token: token.to_string() }))
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn active_connections(&self, session: &Session) -> Result<Vec<ExchangeConnection>> {
        let tables = self.tables.read().await;
        Ok(tables
            .connections
            .iter()
            .filter(|c| c.user_id == session.user.id && c.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn latest_opened_at(&self, session: &Session, account_id: &str) -> Result<Option<i64>> {
        let tables = self.tables.read().await;
        Ok(tables
            .trades
            .iter()
            .filter(|r| r.user_id == session.user.id && r.trading_account_id == account_id)
            .filter_map(|r| parse_rfc3339_ms(&r.opened_at))
            .max())
    }

    async fn upsert_trades(&self, _session: &Session, rows: &[TradeRow]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for row in rows {
            let exists = tables.trades.iter().any(|r| {
                r.trading_account_id == row.trading_account_id && r.exchange_order_id == row.exchange_order_id
            });
            if !exists {
                tables.trades.push(row.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.tables.read().await.profiles.get(user_id).cloned())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<()> {
        let mut tables = self.tables.write().await;
        let profile = tables
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile { id: user_id.to_string(), ..Default::default() });
        update.apply_to(profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use dash_core::types::Platform;

    use super::*;
    use crate::model::TradeRowMetadata;

    fn user() -> User {
        User { id: "u1".into(), email: Some("a@b.c".into()) }
    }

    fn conn(id: &str, active: bool) -> ExchangeConnection {
        ExchangeConnection {
            id: id.into(),
            user_id: "u1".into(),
            exchange_platform: Platform::Binance,
            api_key_encrypted: "k".into(),
            api_secret_encrypted: "s".into(),
            is_testnet: false,
            is_active: active,
        }
    }

    fn row(id: &str, opened_at: &str) -> TradeRow {
        TradeRow {
            user_id: "u1".into(),
            trading_account_id: "c1".into(),
            exchange_platform: "binance".into(),
            exchange_order_id: id.into(),
            symbol: "BTC/USDT:USDT".into(),
            side: "buy".into(),
            quantity: 1.0,
            price: 1.0,
            executed_quantity: 1.0,
            executed_price: 1.0,
            fee: 0.0,
            fee_currency: "USDT".into(),
            profit_loss: 0.0,
            opened_at: opened_at.into(),
            closed_at: opened_at.into(),
            metadata: TradeRowMetadata { original_order_id: "o".into(), commission_asset: None },
        }
    }

    #[tokio::test]
    async fn unknown_token_has_no_session() {
        let store = MemoryStore::new().with_user("tok", user());
        assert!(store.resolve("other").await.unwrap().is_none());
        assert!(store.resolve("").await.unwrap().is_none());
        assert_eq!(store.resolve("tok").await.unwrap().unwrap().user.id, "u1");
    }

    #[tokio::test]
    async fn only_active_connections() {
        let store = MemoryStore::new()
            .with_user("tok", user())
            .with_connection(conn("c1", true))
            .with_connection(conn("c2", false));
        let session = store.resolve("tok").await.unwrap().unwrap();
        let conns = store.active_connections(&session).await.unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].id, "c1");
    }

    #[tokio::test]
    async fn upsert_ignores_duplicates() {
        let store = MemoryStore::new().with_user("tok", user());
        let session = store.resolve("tok").await.unwrap().unwrap();
        store
            .upsert_trades(&session, &[row("t1", "2024-03-07T09:05:00.000Z"), row("t2", "2024-03-08T09:05:00.000Z")])
            .await
            .unwrap();
        store.upsert_trades(&session, &[row("t1", "2024-03-09T00:00:00.000Z")]).await.unwrap();
        assert_eq!(store.trades().await.len(), 2);
        let latest = store.latest_opened_at(&session, "c1").await.unwrap();
        assert_eq!(latest, parse_rfc3339_ms("2024-03-08T09:05:00.000Z"));
    }

    #[tokio::test]
    async fn update_creates_missing_profile() {
        let store = MemoryStore::new();
        store.update_profile("u9", &ProfileUpdate::PastDue).await.unwrap();
        let profile = store.profile("u9").await.unwrap().unwrap();
        assert_eq!(profile.subscription_status.as_deref(), Some("past_due"));
    }
}
