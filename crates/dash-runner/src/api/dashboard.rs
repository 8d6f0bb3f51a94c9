//! Read endpoints behind the dashboard panels, plus sync and stream keys.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use dash_core::types::*;
use serde::Deserialize;

use super::auth::BearerToken;
use super::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
struct QuickStatsQuery {
    asset: Option<String>,
}

#[derive(Deserialize)]
struct DailyQuery {
    days: Option<i64>,
}

#[derive(Deserialize)]
struct PortfolioQuery {
    timeframe: Option<String>,
}

async fn quick_stats(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    Query(q): Query<QuickStatsQuery>,
) -> Json<QuickStats> {
    Json(state.aggregator.quick_stats(&token, q.asset.as_deref()).await)
}

async fn recent_trades(State(state): State<Arc<AppState>>, BearerToken(token): BearerToken) -> Json<Vec<TradeItem>> {
    Json(state.aggregator.recent_trades(&token).await)
}

async fn account(State(state): State<Arc<AppState>>, BearerToken(token): BearerToken) -> Json<AccountData> {
    Json(state.aggregator.account_data(&token).await)
}

async fn open_orders(State(state): State<Arc<AppState>>, BearerToken(token): BearerToken) -> Json<Vec<OrderItem>> {
    Json(state.aggregator.open_orders(&token).await)
}

async fn realized_pnl(State(state): State<Arc<AppState>>, BearerToken(token): BearerToken) -> Json<RealizedPnl> {
    Json(state.aggregator.realized_pnl(&token).await)
}

async fn daily_pnl(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    Query(q): Query<DailyQuery>,
) -> Json<Vec<DailyPnl>> {
    Json(state.aggregator.daily_pnl(&token, q.days).await)
}

async fn portfolio_history(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    Query(q): Query<PortfolioQuery>,
) -> ApiResult<Json<PortfolioHistory>> {
    let timeframe = match q.timeframe.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(tf) => tf.parse::<Timeframe>().map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => Timeframe::default(),
    };
    Ok(Json(state.aggregator.portfolio_history(&token, timeframe).await))
}

async fn sync_trades(State(state): State<Arc<AppState>>, BearerToken(token): BearerToken) -> Json<SyncReport> {
    Json(state.aggregator.sync_trades(&token).await)
}

async fn stream_key(State(state): State<Arc<AppState>>, BearerToken(token): BearerToken) -> ApiResult<Json<StreamKey>> {
    state
        .aggregator
        .user_stream_key(&token)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no connection could issue a stream key".into()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stats/quick", get(quick_stats))
        .route("/api/trades/recent", get(recent_trades))
        .route("/api/account", get(account))
        .route("/api/orders/open", get(open_orders))
        .route("/api/pnl/realized", get(realized_pnl))
        .route("/api/pnl/daily", get(daily_pnl))
        .route("/api/portfolio/history", get(portfolio_history))
        .route("/api/trades/sync", post(sync_trades))
        .route("/api/stream/key", post(stream_key))
}
