//! Private account stream keys.

use anyhow::Result;
use dash_core::error::DashError;
use dash_core::logging::redact;
use dash_core::types::StreamKey;
use tracing::{info, warn};

use crate::connections::ConnectedAccount;
use crate::Aggregator;

impl Aggregator {
    /// Issue a key from the first connection that yields one.
    pub async fn user_stream_key(&self, token: &str) -> Option<StreamKey> {
        let accounts = self.accounts(token).await;
        for acc in &accounts {
            match acc.adapter.issue_stream_key().await {
                Ok(listen_key) => {
                    info!("[aggregate] stream key {} from {}", redact(&listen_key), acc.connection.id);
                    return Some(StreamKey {
                        listen_key,
                        is_testnet: acc.adapter.is_testnet(),
                        connection_id: acc.connection.id.clone(),
                    });
                }
                Err(e) => warn!("[aggregate] stream key from {} failed: {e:#}", acc.connection.id),
            }
        }
        None
    }

    pub async fn keepalive_stream_key(&self, token: &str, key: &StreamKey) -> Result<()> {
        let acc = self.account_by_id(token, &key.connection_id).await?;
        acc.adapter.keepalive_stream_key(&key.listen_key).await
    }

    pub async fn close_stream_key(&self, token: &str, key: &StreamKey) -> Result<()> {
        let acc = self.account_by_id(token, &key.connection_id).await?;
        acc.adapter.close_stream_key(&key.listen_key).await
    }

    async fn account_by_id(&self, token: &str, connection_id: &str) -> Result<ConnectedAccount> {
        let conns: Vec<_> = self
            .active_connections(token)
            .await
            .into_iter()
            .filter(|c| c.id == connection_id)
            .collect();
        if conns.is_empty() {
            return Err(DashError::Unauthenticated(format!("no active connection {connection_id}")).into());
        }
        self.connect_all(conns)
            .await
            .pop()
            .ok_or_else(|| DashError::Exchange(format!("connection {connection_id} unavailable")).into())
    }
}
