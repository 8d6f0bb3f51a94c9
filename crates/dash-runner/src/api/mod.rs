//! HTTP surface.
//!
//! | Route                          | Method | Handler module |
//! |--------------------------------|--------|----------------|
//! | `/api/stats/quick?asset=`      | GET    | dashboard      |
//! | `/api/trades/recent`           | GET    | dashboard      |
//! | `/api/account`                 | GET    | dashboard      |
//! | `/api/orders/open`             | GET    | dashboard      |
//! | `/api/pnl/realized`            | GET    | dashboard      |
//! | `/api/pnl/daily?days=`         | GET    | dashboard      |
//! | `/api/portfolio/history?timeframe=` | GET | dashboard   |
//! | `/api/trades/sync`             | POST   | dashboard      |
//! | `/api/stream/key`              | POST   | dashboard      |
//! | `/api/positions/live`          | GET    | live (SSE)     |
//! | `/api/billing/{checkout,portal,webhook}` | POST | billing |
//! | `/api/health`                  | GET    | here           |

mod auth;
mod billing;
mod dashboard;
mod error;
mod live;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs.max(1));
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .merge(dashboard::router())
        .merge(live::router())
        .merge(billing::router())
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use dash_billing::compute_signature;
    use dash_core::config::AppConfig;
    use dash_core::time_util::now_ms;
    use dash_exchange::PlatformConnector;
    use dash_store::{MemoryStore, ProfileStore, UserProfile};

    use super::*;

    struct Server {
        base: String,
        store: Arc<MemoryStore>,
        http: reqwest::Client,
    }

    async fn spawn(billing: bool) -> Server {
        let mut config = AppConfig::default();
        if billing {
            config.billing.secret_key = Some("sk_test".into());
            config.billing.webhook_secret = Some("whsec_test".into());
            config.billing.api_url = "http://127.0.0.1:1".into();
        }
        let store = Arc::new(MemoryStore::new().with_profile(UserProfile { id: "u1".into(), ..Default::default() }));
        let connector = Arc::new(PlatformConnector::new(config.exchange.clone()));
        let state = Arc::new(AppState::build(store.clone(), connector, config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        Server { base: format!("http://{addr}"), store, http: reqwest::Client::new() }
    }

    #[tokio::test]
    async fn health_and_anonymous_reads() {
        let srv = spawn(false).await;
        let resp = srv.http.get(format!("{}/api/health", srv.base)).send().await.unwrap();
        assert_eq!(resp.status(), 200);

        let stats: Value =
            srv.http.get(format!("{}/api/stats/quick?asset=BTC", srv.base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(stats["totalTrades"], "0");

        let sync: Value =
            srv.http.post(format!("{}/api/trades/sync", srv.base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(sync["success"], false);

        let resp = srv.http.get(format!("{}/api/portfolio/history?timeframe=2X", srv.base)).send().await.unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], 400);

        let resp = srv.http.get(format!("{}/api/positions/live", srv.base)).send().await.unwrap();
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn billing_requires_configuration() {
        let srv = spawn(false).await;
        let resp = srv
            .http
            .post(format!("{}/api/billing/webhook", srv.base))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 503);
    }

    #[tokio::test]
    async fn billing_validates_before_calling_out() {
        let srv = spawn(true).await;

        let resp = srv
            .http
            .post(format!("{}/api/billing/checkout", srv.base))
            .json(&json!({ "userId": "u1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Missing required fields: priceId, userId, userEmail");

        let resp = srv
            .http
            .post(format!("{}/api/billing/portal", srv.base))
            .json(&json!({ "userId": "u1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        let resp = srv.http.post(format!("{}/api/billing/webhook", srv.base)).body("{}").send().await.unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn signed_webhook_updates_profile() {
        let srv = spawn(true).await;
        let payload = json!({"type": "customer.subscription.deleted", "data": {"object": {
            "id": "sub_1", "status": "canceled", "metadata": {"supabase_user_id": "u1"}
        }}})
        .to_string();
        let t = now_ms() / 1000;
        let signature = format!("t={t},v1={}", compute_signature("whsec_test", t, payload.as_bytes()));

        let resp = srv
            .http
            .post(format!("{}/api/billing/webhook", srv.base))
            .header("stripe-signature", signature)
            .body(payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["received"], true);

        let profile = srv.store.profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.subscription_status.as_deref(), Some("canceled"));
    }
}
