//! Typed error definitions for the dashboard backend.
//!
//! [`DashError`] carries the domain-specific failures that callers may want to
//! distinguish (e.g. "no session" vs. "exchange down"). All variants implement
//! `std::error::Error` via `thiserror`, so they compose with `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the dashboard backend.
#[derive(Debug, Error)]
pub enum DashError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// The caller has no valid session.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Persistence layer (database REST API) failure.
    #[error("store error: {0}")]
    Store(String),

    /// Exchange REST call failed or returned an error payload.
    #[error("exchange error: {0}")]
    Exchange(String),

    /// Response or message parsing error.
    #[error("parse error: {0}")]
    Parse(String),

    /// WebSocket connection, handshake, or communication error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Payment provider failure.
    #[error("billing error: {0}")]
    Billing(String),

    /// Signature verification failed.
    #[error("signature error: {0}")]
    Signature(String),

    /// No adapter exists for the requested exchange platform.
    #[error("unsupported: {0}")]
    Unsupported(String),
}
