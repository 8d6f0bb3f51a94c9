//! Session → active connections → ready adapters.

use std::sync::Arc;

use dash_core::error::DashError;
use dash_core::types::ExchangeConnection;
use dash_exchange::ExchangeAdapter;
use dash_store::Session;
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::Aggregator;

/// A connection paired with its built adapter.
#[derive(Clone)]
pub struct ConnectedAccount {
    pub connection: ExchangeConnection,
    pub adapter: Arc<dyn ExchangeAdapter>,
}

impl ConnectedAccount {
    /// Unified symbols of the watch-list pairs this account's exchange lists.
    pub fn known_symbols(&self, pairs: &[String]) -> Vec<String> {
        pairs.iter().filter_map(|p| self.adapter.market(p)).map(|m| m.symbol.clone()).collect()
    }
}

impl Aggregator {
    /// Resolve a bearer token. Store failures are logged and treated as
    /// "no session".
    pub async fn session(&self, token: &str) -> Option<Session> {
        if token.is_empty() {
            return None;
        }
        match self.sessions.resolve(token).await {
            Ok(session) => session,
            Err(e) => {
                warn!("[aggregate] session lookup failed: {e:#}");
                None
            }
        }
    }

    /// Active connections of the caller; empty when unauthenticated.
    pub async fn active_connections(&self, token: &str) -> Vec<ExchangeConnection> {
        match self.session(token).await {
            Some(session) => self.connections_of(&session).await,
            None => Vec::new(),
        }
    }

    pub(crate) async fn connections_of(&self, session: &Session) -> Vec<ExchangeConnection> {
        match self.connections.active_connections(session).await {
            Ok(conns) => conns.into_iter().filter(|c| c.is_active).collect(),
            Err(e) => {
                warn!("[aggregate] loading connections for {} failed: {e:#}", session.user.id);
                Vec::new()
            }
        }
    }

    /// Build adapters concurrently; connections that fail are skipped.
    pub(crate) async fn connect_all(&self, conns: Vec<ExchangeConnection>) -> Vec<ConnectedAccount> {
        let attempts = conns.into_iter().map(|conn| async move {
            match self.connector.connect(&conn).await {
                Ok(adapter) => Some(ConnectedAccount { connection: conn, adapter }),
                Err(e) => {
                    if matches!(e.downcast_ref::<DashError>(), Some(DashError::Unsupported(_))) {
                        debug!("[aggregate] skipping connection {}: {e}", conn.id);
                    } else {
                        warn!("[aggregate] connection {} unavailable: {e:#}", conn.id);
                    }
                    None
                }
            }
        });
        join_all(attempts).await.into_iter().flatten().collect()
    }

    /// Everything an operation needs: connected accounts of the caller.
    pub async fn accounts(&self, token: &str) -> Vec<ConnectedAccount> {
        let conns = self.active_connections(token).await;
        if conns.is_empty() {
            return Vec::new();
        }
        self.connect_all(conns).await
    }
}
