//! # dash-core
//!
//! Core crate for the trading dashboard backend, providing:
//!
//! - **Types** (`types`): enums, exchange-neutral records, stored rows, view shapes
//! - **Configuration** (`config`): JSON config deserialization with env overrides
//! - **Error types** (`error`): domain-specific `DashError` via thiserror
//! - **WebSocket** (`ws`): WS client with supervised reconnect
//! - **Deduplication** (`dedup`): first-seen order-id filter
//! - **JSON helpers** (`json_util`): string-or-number field parsing
//! - **Time utilities** (`time_util`): UTC day math and display formats
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod dedup;
pub mod error;
pub mod json_util;
pub mod logging;
pub mod time_util;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
