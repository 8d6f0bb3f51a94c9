//! Supervised live position session.
//!
//! ```text
//! backend.snapshot() ──Seed──►┐
//! mark-price WS ──Price──────►├─► run_book ──► watch<Vec<PositionItem>>
//! user-data WS ──Position────►┘
//! ```
//!
//! The public feed reconnects on its own ([`WsConnection`]). The private feed
//! is supervised here: every (re)connect issues a fresh stream key, reseeds
//! the book from a REST snapshot, keeps the key alive on a timer and closes
//! it when the stream ends.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dash_core::config::{ExchangeConfig, LiveConfig};
use dash_core::logging::redact;
use dash_core::types::{PositionItem, StreamKey};
use dash_core::ws::{Backoff, OnMessageCallback, SessionEnd, WsConnConfig, WsConnection, run_session, sleep_or_shutdown};
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::LiveBackend;
use crate::book::{BookCommand, run_book};
use crate::parser::{LiveEvent, parse_market_message, parse_user_message};

const MARKET_WS_ID: usize = 0;
const USER_WS_ID: usize = 1;

/// A running live session. Dropping it without [`stop`](Self::stop) leaves
/// the tasks to wind down when their channels close.
pub struct LiveSession {
    snapshots: watch::Receiver<Vec<PositionItem>>,
    shutdown_tx: watch::Sender<bool>,
    market: WsConnection,
    supervisor: Option<JoinHandle<()>>,
    book: Option<JoinHandle<()>>,
}

impl LiveSession {
    /// Seed from the backend and open both feeds.
    pub async fn start(backend: Arc<dyn LiveBackend>, exchange: &ExchangeConfig, live: &LiveConfig) -> Result<Self> {
        let seed = backend.snapshot().await.context("initial position snapshot failed")?;

        let (price_tx, price_rx) = mpsc::channel(live.event_buffer.max(1));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (snap_tx, snap_rx) = watch::channel(Vec::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let _ = cmd_tx.send(BookCommand::Seed(seed));
        let book = tokio::spawn(run_book(price_rx, cmd_rx, snap_tx));

        let backoff_initial = Duration::from_millis(live.backoff_initial_ms);
        let backoff_max = Duration::from_millis(live.backoff_max_ms);

        let on_price: OnMessageCallback = Arc::new(move |_, text| {
            for event in parse_market_message(text) {
                // A dropped tick is superseded by the next one.
                if price_tx.try_send(event).is_err() {
                    debug!("[live] price buffer full, tick dropped");
                }
            }
        });
        let mut market = WsConnection::new(
            WsConnConfig::new(MARKET_WS_ID, exchange.market_ws_url.clone()).with_backoff(backoff_initial, backoff_max),
        );
        market.start(on_price);

        let supervisor = tokio::spawn(supervise_user_stream(
            backend,
            exchange.clone(),
            cmd_tx,
            shutdown_rx,
            Backoff::new(backoff_initial, backoff_max),
        ));

        info!("[live] session started");
        Ok(Self { snapshots: snap_rx, shutdown_tx, market, supervisor: Some(supervisor), book: Some(book) })
    }

    /// Receiver that changes on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Vec<PositionItem>> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> Vec<PositionItem> {
        self.snapshots.borrow().clone()
    }

    /// Close both feeds (and the stream key) and wait for the tasks.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        self.market.stop().await;
        if let Some(task) = self.supervisor.take() {
            let _ = task.await;
        }
        // Both senders are gone now, so the book drains and exits.
        if let Some(task) = self.book.take() {
            let _ = task.await;
        }
        info!("[live] session stopped");
    }
}

/// Keep the private feed up until shutdown.
async fn supervise_user_stream(
    backend: Arc<dyn LiveBackend>,
    exchange: ExchangeConfig,
    cmd_tx: mpsc::UnboundedSender<BookCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut backoff: Backoff,
) {
    let refresh = Duration::from_secs(exchange.listen_key_refresh_secs.max(1));
    let mut first = true;

    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        if !first {
            match backend.snapshot().await {
                Ok(items) => {
                    let _ = cmd_tx.send(BookCommand::Seed(items));
                }
                Err(e) => warn!("[live] reseed failed: {e:#}"),
            }
        }
        first = false;

        let key = match backend.issue_key().await {
            Ok(Some(key)) => key,
            Ok(None) => {
                let delay = backoff.next_delay();
                warn!("[live] no stream key available, retrying in {delay:?}");
                if !sleep_or_shutdown(delay, &mut shutdown_rx).await {
                    return;
                }
                continue;
            }
            Err(e) => {
                let delay = backoff.next_delay();
                warn!("[live] stream key request failed: {e:#}, retrying in {delay:?}");
                if !sleep_or_shutdown(delay, &mut shutdown_rx).await {
                    return;
                }
                continue;
            }
        };

        info!("[live] user stream key {}", redact(&key.listen_key));
        let end = run_user_stream(&backend, &exchange, &key, &cmd_tx, &mut shutdown_rx, refresh).await;
        if let Err(e) = backend.close_key(&key).await {
            debug!("[live] closing stream key failed: {e:#}");
        }

        match end {
            Ok(SessionEnd::Shutdown) => return,
            Ok(SessionEnd::Disconnected(reason)) => {
                backoff.reset();
                let delay = backoff.next_delay();
                warn!("[live] user stream ended ({reason}), reconnecting in {delay:?}");
                if !sleep_or_shutdown(delay, &mut shutdown_rx).await {
                    return;
                }
            }
            Err(e) => {
                let delay = backoff.next_delay();
                warn!("[live] user stream connect failed: {e:#}, retrying in {delay:?}");
                if !sleep_or_shutdown(delay, &mut shutdown_rx).await {
                    return;
                }
            }
        }
    }
}

/// One connection of the private feed, with keepalive ticks alongside.
async fn run_user_stream(
    backend: &Arc<dyn LiveBackend>,
    exchange: &ExchangeConfig,
    key: &StreamKey,
    cmd_tx: &mpsc::UnboundedSender<BookCommand>,
    shutdown_rx: &mut watch::Receiver<bool>,
    refresh: Duration,
) -> Result<SessionEnd> {
    let expired = Arc::new(Notify::new());
    let on_text: OnMessageCallback = {
        let cmd_tx = cmd_tx.clone();
        let expired = expired.clone();
        let connection_id = key.connection_id.clone();
        Arc::new(move |_, text| {
            for event in parse_user_message(text) {
                match event {
                    LiveEvent::StreamExpired => expired.notify_one(),
                    LiveEvent::Position(delta) => {
                        let _ = cmd_tx.send(BookCommand::Delta { connection_id: connection_id.clone(), delta });
                    }
                    LiveEvent::Price { .. } => {}
                }
            }
        })
    };
    let config = WsConnConfig::new(USER_WS_ID, exchange.user_stream_url(key.is_testnet, &key.listen_key));

    let session = run_session(&config, &on_text, shutdown_rx);
    tokio::pin!(session);
    let mut keepalive = tokio::time::interval_at(tokio::time::Instant::now() + refresh, refresh);

    loop {
        tokio::select! {
            end = &mut session => return end,
            _ = expired.notified() => {
                return Ok(SessionEnd::Disconnected("listen key expired".into()));
            }
            _ = keepalive.tick() => {
                if let Err(e) = backend.keepalive_key(key).await {
                    warn!("[live] stream key keepalive failed: {e:#}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use dash_core::types::PositionSide;

    use super::*;

    #[derive(Default)]
    struct FakeBackend {
        key_requests: AtomicUsize,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl LiveBackend for FakeBackend {
        async fn snapshot(&self) -> Result<Vec<PositionItem>> {
            Ok(vec![PositionItem {
                id: "c1-BTC/USDT:USDT".into(),
                pair: "BTC/USDT".into(),
                symbol: "BTCUSDT".into(),
                side: PositionSide::Long,
                entry_price: 100.0,
                current_price: 101.0,
                size: 1.0,
                pnl: 1.0,
                pnl_percent: 1.0,
            }])
        }

        async fn issue_key(&self) -> Result<Option<StreamKey>> {
            self.key_requests.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn keepalive_key(&self, _key: &StreamKey) -> Result<()> {
            Ok(())
        }

        async fn close_key(&self, _key: &StreamKey) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn seeds_then_stops_cleanly() {
        let backend = Arc::new(FakeBackend::default());
        let exchange = ExchangeConfig { market_ws_url: "ws://127.0.0.1:1/never".into(), ..Default::default() };
        let live = LiveConfig { backoff_initial_ms: 10, backoff_max_ms: 50, event_buffer: 4 };

        let session = LiveSession::start(backend.clone(), &exchange, &live).await.unwrap();
        let mut rx = session.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|p| !p.is_empty()))
            .await
            .expect("seed snapshot")
            .unwrap();
        assert_eq!(session.snapshot()[0].symbol, "BTCUSDT");

        tokio::time::timeout(Duration::from_secs(5), session.stop()).await.expect("stop");
        assert!(backend.key_requests.load(Ordering::SeqCst) >= 1);
        assert_eq!(backend.closes.load(Ordering::SeqCst), 0);
    }
}
