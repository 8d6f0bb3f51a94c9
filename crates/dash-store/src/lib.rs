//! # dash-store
//!
//! Boundary to the hosted auth/database service.
//!
//! The dashboard never owns user data: identities, exchange connections,
//! persisted trades and subscription profiles all live in the hosted service
//! and are reached through its REST API. This crate exposes that boundary as
//! a handful of narrow traits so the aggregation and billing crates can be
//! exercised against [`MemoryStore`] in tests and [`RestStore`] in production.
//!
//! | Trait               | Table / endpoint               |
//! |---------------------|--------------------------------|
//! | [`SessionResolver`] | `/auth/v1/user`                |
//! | [`ConnectionStore`] | `user_exchange_connections`    |
//! | [`TradeStore`]      | `trades`                       |
//! | [`ProfileStore`]    | `user_profiles` (service role) |

pub mod memory;
pub mod model;
pub mod rest;

use anyhow::Result;
use async_trait::async_trait;
use dash_core::types::ExchangeConnection;

pub use memory::MemoryStore;
pub use model::{ProfileUpdate, Session, SubscriptionState, TradeRow, TradeRowMetadata, UserProfile};
pub use rest::RestStore;

/// Resolves an opaque bearer token to the calling user.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// `Ok(None)` when the token is missing, expired or unknown.
    async fn resolve(&self, token: &str) -> Result<Option<Session>>;
}

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Connections of the session's user with `is_active = true`.
    async fn active_connections(&self, session: &Session) -> Result<Vec<ExchangeConnection>>;
}

#[async_trait]
pub trait TradeStore: Send + Sync {
    /// `opened_at` (ms) of the newest persisted trade of one account.
    async fn latest_opened_at(&self, session: &Session, account_id: &str) -> Result<Option<i64>>;

    /// Insert rows, silently skipping any whose
    /// `(trading_account_id, exchange_order_id)` already exists.
    async fn upsert_trades(&self, session: &Session, rows: &[TradeRow]) -> Result<()>;
}

/// Subscription columns of the user profile. Written with service rights
/// (webhooks carry no user session).
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<()>;
}
