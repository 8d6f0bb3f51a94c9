use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::ORIGIN;
use axum::routing::post;
use axum::{Json, Router};
use dash_billing::{BillingService, CheckoutRequest, CheckoutResponse, PortalResponse};
use serde::Deserialize;
use serde_json::{Value, json};

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortalRequest {
    #[serde(default)]
    user_id: String,
}

fn service(state: &AppState) -> ApiResult<&BillingService> {
    state.billing.as_deref().ok_or_else(|| ApiError::Unavailable("billing is not configured".into()))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn checkout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    Ok(Json(service(&state)?.checkout(&req, header(&headers, ORIGIN.as_str())).await?))
}

async fn portal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<PortalRequest>,
) -> ApiResult<Json<PortalResponse>> {
    Ok(Json(service(&state)?.portal(&req.user_id, header(&headers, ORIGIN.as_str())).await?))
}

/// Raw body: the signature covers the exact bytes.
async fn webhook(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> ApiResult<Json<Value>> {
    service(&state)?.handle_webhook(&body, header(&headers, SIGNATURE_HEADER)).await?;
    Ok(Json(json!({ "received": true })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/billing/checkout", post(checkout))
        .route("/api/billing/portal", post(portal))
        .route("/api/billing/webhook", post(webhook))
}
