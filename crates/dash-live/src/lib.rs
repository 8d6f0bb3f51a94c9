//! # dash-live
//!
//! Realtime position merge: open positions from a REST snapshot, kept current
//! by the public mark-price feed and the private account-update feed.
//!
//! - [`parser`]: stream messages → [`parser::LiveEvent`]
//! - [`book`]: the position table and the task that owns it
//! - [`session`]: feed supervision, stream-key lifecycle, teardown

pub mod book;
pub mod parser;
pub mod session;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dash_aggregate::Aggregator;
use dash_core::types::{PositionItem, StreamKey};

pub use session::LiveSession;

/// What a live session needs from the rest of the system.
#[async_trait]
pub trait LiveBackend: Send + Sync {
    /// Current open positions (REST).
    async fn snapshot(&self) -> Result<Vec<PositionItem>>;

    /// A key for the private stream, `None` if no connection can issue one.
    async fn issue_key(&self) -> Result<Option<StreamKey>>;

    async fn keepalive_key(&self, key: &StreamKey) -> Result<()>;

    async fn close_key(&self, key: &StreamKey) -> Result<()>;
}

/// [`LiveBackend`] over the aggregator, bound to one caller's token.
pub struct AggregatorBackend {
    aggregator: Arc<Aggregator>,
    token: String,
}

impl AggregatorBackend {
    pub fn new(aggregator: Arc<Aggregator>, token: impl Into<String>) -> Self {
        Self { aggregator, token: token.into() }
    }
}

#[async_trait]
impl LiveBackend for AggregatorBackend {
    async fn snapshot(&self) -> Result<Vec<PositionItem>> {
        Ok(self.aggregator.account_data(&self.token).await.positions)
    }

    async fn issue_key(&self) -> Result<Option<StreamKey>> {
        Ok(self.aggregator.user_stream_key(&self.token).await)
    }

    async fn keepalive_key(&self, key: &StreamKey) -> Result<()> {
        self.aggregator.keepalive_stream_key(&self.token, key).await
    }

    async fn close_key(&self, key: &StreamKey) -> Result<()> {
        self.aggregator.close_stream_key(&self.token, key).await
    }
}
