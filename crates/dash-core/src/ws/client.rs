//! Single WebSocket connection with auto-reconnect and ping keep-alive.
//!
//! Two ways to drive a stream:
//!
//! - [`WsConnection`] owns a tokio task that connects, forwards every text
//!   frame to a callback, and reconnects forever with exponential backoff
//!   until stopped. Used for the public price feed.
//! - [`run_session`] runs exactly one connect/read cycle and reports how it
//!   ended, so a caller can do its own work between reconnects (e.g. issue a
//!   fresh stream key and reseed state). Used for the private account feed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tracing::{debug, info, warn};

/// Callback invoked for each received text message.
///
/// Parameters: `(connection_id, message_text)`
pub type OnMessageCallback = Arc<dyn Fn(usize, &str) + Send + Sync>;

/// Configuration for a single WebSocket connection.
#[derive(Debug, Clone)]
pub struct WsConnConfig {
    /// Full WebSocket URL (e.g. `wss://fstream.binance.com/ws/!markPrice@arr@1s`).
    pub url: String,
    /// Extra HTTP headers for the handshake.
    pub extra_headers: HashMap<String, String>,
    /// Interval between WebSocket ping frames.
    pub ping_interval: Option<Duration>,
    /// Connection identifier used in log lines.
    pub id: usize,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl WsConnConfig {
    pub fn new(id: usize, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extra_headers: HashMap::new(),
            ping_interval: Some(Duration::from_secs(180)),
            id,
            backoff_initial: Duration::from_millis(100),
            backoff_max: Duration::from_secs(30),
        }
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial = initial;
        self.backoff_max = max;
        self
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Exponential reconnect delay, doubling up to a cap.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max, current: initial }
    }

    /// Delay to wait now; the following call returns twice as much (capped).
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Sleep for `delay` unless shutdown is signalled first. Returns `false` on
/// shutdown.
pub async fn sleep_or_shutdown(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown_rx.changed() => false,
    }
}

// ---------------------------------------------------------------------------
// One session
// ---------------------------------------------------------------------------

/// How a connected session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was requested; do not reconnect.
    Shutdown,
    /// The stream dropped (close frame, read error, EOF).
    Disconnected(String),
}

/// Connect once and pump text frames into `on_text` until the stream ends or
/// shutdown is signalled. A failed handshake is returned as `Err`.
pub async fn run_session(
    config: &WsConnConfig,
    on_text: &OnMessageCallback,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> anyhow::Result<SessionEnd> {
    let conn_id = config.id;
    if *shutdown_rx.borrow() {
        return Ok(SessionEnd::Shutdown);
    }

    let ws_stream = connect_ws(config).await?;
    info!("[ws-{conn_id}] connected");
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let mut ping = config
        .ping_interval
        .map(|period| tokio::time::interval_at(tokio::time::Instant::now() + period, period));

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                info!("[ws-{conn_id}] shutdown signal received");
                let _ = ws_write.close().await;
                return Ok(SessionEnd::Shutdown);
            }

            msg = ws_read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => on_text(conn_id, &text),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Ok(SessionEnd::Disconnected(format!("close frame {frame:?}")));
                    }
                    Some(Err(e)) => return Ok(SessionEnd::Disconnected(format!("read error: {e}"))),
                    None => return Ok(SessionEnd::Disconnected("stream ended".into())),
                    _ => {} // Binary, Pong, Frame
                }
            }

            _ = next_ping(&mut ping) => {
                if let Err(e) = ws_write.send(Message::Ping(Vec::new().into())).await {
                    return Ok(SessionEnd::Disconnected(format!("ping send error: {e}")));
                }
            }
        }
    }
}

/// Resolves on the next ping tick; never when pinging is disabled.
async fn next_ping(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(i) => {
            i.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

// ---------------------------------------------------------------------------
// Reconnecting connection
// ---------------------------------------------------------------------------

/// A WebSocket connection managed by a background tokio task.
pub struct WsConnection {
    pub config: WsConnConfig,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsConnection {
    /// Create a new (not yet started) connection.
    pub fn new(config: WsConnConfig) -> Self {
        Self { config, shutdown_tx: None, task: None }
    }

    /// Start the connection task. Text frames are forwarded to `on_text`.
    pub fn start(&mut self, on_text: OnMessageCallback) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            connection_loop(config, on_text, shutdown_rx).await;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the connection and wait for the task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Connect, read, reconnect with backoff; exits only on shutdown.
async fn connection_loop(
    config: WsConnConfig,
    on_text: OnMessageCallback,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let conn_id = config.id;
    let mut backoff = Backoff::new(config.backoff_initial, config.backoff_max);

    loop {
        debug!("[ws-{conn_id}] connecting to {}", config.url);
        match run_session(&config, &on_text, &mut shutdown_rx).await {
            Ok(SessionEnd::Shutdown) => {
                info!("[ws-{conn_id}] shutdown requested");
                return;
            }
            Ok(SessionEnd::Disconnected(reason)) => {
                backoff.reset();
                let delay = backoff.next_delay();
                warn!("[ws-{conn_id}] disconnected ({reason}), reconnecting in {delay:?}");
                if !sleep_or_shutdown(delay, &mut shutdown_rx).await {
                    return;
                }
            }
            Err(e) => {
                let delay = backoff.next_delay();
                warn!("[ws-{conn_id}] connection failed: {e}, retrying in {delay:?}");
                if !sleep_or_shutdown(delay, &mut shutdown_rx).await {
                    return;
                }
            }
        }
    }
}

/// Establish a (TLS) WebSocket connection.
async fn connect_ws(
    config: &WsConnConfig,
) -> anyhow::Result<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
> {
    let mut request = config.url.as_str().into_client_request()?;
    for (key, value) in &config.extra_headers {
        request
            .headers_mut()
            .insert(HeaderName::from_bytes(key.as_bytes())?, HeaderValue::from_str(value)?);
    }

    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut b = Backoff::new(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(b.next_delay(), Duration::from_millis(100));
        assert_eq!(b.next_delay(), Duration::from_millis(200));
        assert_eq!(b.next_delay(), Duration::from_millis(350));
        assert_eq!(b.next_delay(), Duration::from_millis(350));
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn sleep_returns_false_on_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        assert!(!sleep_or_shutdown(Duration::from_secs(60), &mut rx).await);
    }

    #[tokio::test]
    async fn session_skips_connect_after_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        let cb: OnMessageCallback = Arc::new(|_, _| {});
        let config = WsConnConfig::new(0, "ws://127.0.0.1:1/never");
        let end = run_session(&config, &cb, &mut rx).await.unwrap();
        assert_eq!(end, SessionEnd::Shutdown);
    }
}
