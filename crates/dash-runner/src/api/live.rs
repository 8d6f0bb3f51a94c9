//! `GET /api/positions/live`: position snapshots as server-sent events.
//!
//! Each request owns one [`LiveSession`]; it is stopped when the client
//! disconnects and the response stream is dropped.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use dash_core::types::PositionItem;
use dash_live::{AggregatorBackend, LiveSession};
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info};

use super::auth::BearerToken;
use super::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Stops the session on drop.
struct SessionGuard(Option<LiveSession>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.0.take() {
            info!("[live] client disconnected, stopping session");
            tokio::spawn(session.stop());
        }
    }
}

fn positions_event(items: &[PositionItem]) -> Event {
    Event::default().event("positions").json_data(items).unwrap_or_else(|e| {
        error!("[live] failed to serialize positions: {e}");
        Event::default().event("error").data("serialization failed")
    })
}

async fn live_positions(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if state.aggregator.session(&token).await.is_none() {
        return Err(ApiError::Unauthorized("Unauthorized".into()));
    }
    let backend = Arc::new(AggregatorBackend::new(state.aggregator.clone(), token));
    let session = LiveSession::start(backend, &state.config.exchange, &state.config.live).await?;
    let snapshots = WatchStream::new(session.subscribe());

    let guard = SessionGuard(Some(session));
    let stream = snapshots.map(move |items| {
        let _held = &guard;
        Ok(positions_event(&items))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/positions/live", get(live_positions))
}
