//! Connection → adapter resolution.
//!
//! [`PlatformConnector`] picks the adapter implementation from the stored
//! `exchange_platform` tag. [`ClientPool`] wraps any [`Connector`] and keeps
//! built adapters per connection id for a bounded time; a change of key,
//! secret, platform or testnet flag invalidates the entry.

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use dash_core::config::ExchangeConfig;
use dash_core::error::DashError;
use dash_core::types::{ExchangeConnection, Platform};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::ExchangeAdapter;
use crate::binance::BinanceFutures;
use crate::binance::config::BinanceFuturesConfig;

/// Builds a ready-to-use adapter for a stored connection.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, conn: &ExchangeConnection) -> Result<Arc<dyn ExchangeAdapter>>;
}

// ---------------------------------------------------------------------------
// PlatformConnector
// ---------------------------------------------------------------------------

/// Dispatches on [`Platform`]; unsupported platforms yield
/// [`DashError::Unsupported`].
pub struct PlatformConnector {
    exchange: ExchangeConfig,
}

impl PlatformConnector {
    pub fn new(exchange: ExchangeConfig) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl Connector for PlatformConnector {
    async fn connect(&self, conn: &ExchangeConnection) -> Result<Arc<dyn ExchangeAdapter>> {
        match &conn.exchange_platform {
            Platform::Binance => {
                let (key, secret) = conn
                    .credentials()
                    .ok_or_else(|| anyhow!("connection {} has no credentials", conn.id))?;
                let config = BinanceFuturesConfig::new(&self.exchange, key, secret, conn.is_testnet);
                Ok(Arc::new(BinanceFutures::connect(config).await?))
            }
            other => Err(DashError::Unsupported(format!("exchange platform '{other}'")).into()),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientPool
// ---------------------------------------------------------------------------

struct PoolEntry {
    fingerprint: String,
    created: Instant,
    adapter: Arc<dyn ExchangeAdapter>,
}

/// TTL-bounded cache of adapters keyed by connection id.
pub struct ClientPool<C> {
    inner: C,
    ttl: Duration,
    entries: Mutex<AHashMap<String, PoolEntry>>,
}

impl<C: Connector> ClientPool<C> {
    pub fn new(inner: C, ttl: Duration) -> Self {
        Self { inner, ttl, entries: Mutex::new(AHashMap::new()) }
    }

    /// Drop the cached adapter of one connection.
    pub async fn invalidate(&self, connection_id: &str) {
        self.entries.lock().await.remove(connection_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// Digest of everything that changes what an adapter talks to.
fn fingerprint(conn: &ExchangeConnection) -> String {
    let mut hasher = Sha256::new();
    hasher.update(conn.exchange_platform.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(conn.api_key_encrypted.as_bytes());
    hasher.update([0]);
    hasher.update(conn.api_secret_encrypted.as_bytes());
    hasher.update([conn.is_testnet as u8]);
    hex::encode(hasher.finalize())
}

#[async_trait]
impl<C: Connector> Connector for ClientPool<C> {
    async fn connect(&self, conn: &ExchangeConnection) -> Result<Arc<dyn ExchangeAdapter>> {
        let fp = fingerprint(conn);
        {
            let mut entries = self.entries.lock().await;
            if let Some(entry) = entries.get(&conn.id) {
                if entry.fingerprint == fp && entry.created.elapsed() < self.ttl {
                    return Ok(Arc::clone(&entry.adapter));
                }
                debug!("[pool] evicting adapter for connection {}", conn.id);
                entries.remove(&conn.id);
            }
        }

        // Build outside the lock: connecting does network I/O.
        let adapter = self.inner.connect(conn).await?;
        let mut entries = self.entries.lock().await;
        // Connections that were deleted or deactivated never come back to
        // evict their own entry.
        let before = entries.len();
        entries.retain(|_, e| e.created.elapsed() < self.ttl);
        if entries.len() < before {
            debug!("[pool] swept {} expired adapters", before - entries.len());
        }
        entries.insert(
            conn.id.clone(),
            PoolEntry { fingerprint: fp, created: Instant::now(), adapter: Arc::clone(&adapter) },
        );
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dash_core::types::*;

    use super::*;

    struct StubAdapter;

    #[async_trait]
    impl ExchangeAdapter for StubAdapter {
        fn platform(&self) -> Platform {
            Platform::Binance
        }
        fn is_testnet(&self) -> bool {
            false
        }
        fn markets(&self) -> &[MarketInfo] {
            &[]
        }
        fn market(&self, _symbol: &str) -> Option<&MarketInfo> {
            None
        }
        async fn fetch_my_trades(&self, _: &str, _: Option<i64>, _: u32) -> Result<Vec<Trade>> {
            Ok(Vec::new())
        }
        async fn fetch_balance(&self) -> Result<BalanceSnapshot> {
            Ok(BalanceSnapshot::default())
        }
        async fn fetch_positions(&self) -> Result<Vec<PositionSnapshot>> {
            Ok(Vec::new())
        }
        async fn fetch_open_orders(&self, _: Option<&str>) -> Result<Vec<Order>> {
            Ok(Vec::new())
        }
        async fn fetch_income(&self, _: i64, _: i64) -> Result<Vec<IncomeEvent>> {
            Ok(Vec::new())
        }
        async fn issue_stream_key(&self) -> Result<String> {
            Ok("key".into())
        }
        async fn keepalive_stream_key(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn close_stream_key(&self, _: &str) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingConnector {
        builds: AtomicUsize,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(&self, _conn: &ExchangeConnection) -> Result<Arc<dyn ExchangeAdapter>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubAdapter))
        }
    }

    fn connection(secret: &str) -> ExchangeConnection {
        ExchangeConnection {
            id: "c1".into(),
            user_id: "u1".into(),
            exchange_platform: Platform::Binance,
            api_key_encrypted: "key".into(),
            api_secret_encrypted: secret.into(),
            is_testnet: false,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn reuses_until_credentials_change() {
        let pool = ClientPool::new(CountingConnector::default(), Duration::from_secs(600));
        pool.connect(&connection("s1")).await.unwrap();
        pool.connect(&connection("s1")).await.unwrap();
        assert_eq!(pool.inner.builds.load(Ordering::SeqCst), 1);

        pool.connect(&connection("s2")).await.unwrap();
        assert_eq!(pool.inner.builds.load(Ordering::SeqCst), 2);
        assert_eq!(pool.len().await, 1);

        pool.invalidate("c1").await;
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn expired_entries_are_rebuilt() {
        let pool = ClientPool::new(CountingConnector::default(), Duration::ZERO);
        pool.connect(&connection("s1")).await.unwrap();
        pool.connect(&connection("s1")).await.unwrap();
        assert_eq!(pool.inner.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_entries_of_other_connections_are_swept() {
        let other = ExchangeConnection { id: "c2".into(), ..connection("s1") };

        let pool = ClientPool::new(CountingConnector::default(), Duration::from_secs(600));
        pool.connect(&connection("s1")).await.unwrap();
        pool.connect(&other).await.unwrap();
        assert_eq!(pool.len().await, 2);

        let pool = ClientPool::new(CountingConnector::default(), Duration::ZERO);
        pool.connect(&connection("s1")).await.unwrap();
        pool.connect(&other).await.unwrap();
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn unsupported_platform_is_typed() {
        let connector = PlatformConnector::new(ExchangeConfig::default());
        let mut conn = connection("s1");
        conn.exchange_platform = Platform::Other("kraken".into());
        let err = match connector.connect(&conn).await {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err.downcast_ref::<DashError>(), Some(DashError::Unsupported(_))));
    }
}
