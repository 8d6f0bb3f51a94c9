//! WebSocket client with supervised reconnect.

pub mod client;

pub use client::{
    Backoff, OnMessageCallback, SessionEnd, WsConnConfig, WsConnection, run_session, sleep_or_shutdown,
};
