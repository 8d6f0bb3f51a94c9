//! Stripe REST client.
//!
//! | Operation        | Method | Path                          |
//! |------------------|--------|-------------------------------|
//! | Find customer    | GET    | `/v1/customers?email=&limit=1`|
//! | Create customer  | POST   | `/v1/customers`               |
//! | Checkout session | POST   | `/v1/checkout/sessions`       |
//! | Portal session   | POST   | `/v1/billing_portal/sessions` |
//! | Subscription     | GET    | `/v1/subscriptions/{id}`      |
//!
//! Bodies are form-encoded with bracketed keys (`metadata[tier_code]`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::BillingError;
use crate::provider::{CheckoutParams, CheckoutSession, PaymentProvider, Subscription};

pub struct StripeClient {
    http: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(api_url: &str, secret_key: impl Into<String>) -> Result<Self, BillingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BillingError::Provider(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, api_url: api_url.trim_end_matches('/').to_string(), secret_key: secret_key.into() })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, BillingError> {
        let resp = self
            .http
            .get(format!("{}{path}", self.api_url))
            .bearer_auth(&self.secret_key)
            .query(query)
            .send()
            .await
            .map_err(|e| BillingError::Provider(format!("GET {path} failed: {e}")))?;
        read_json(resp, path).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, form: &[(String, String)]) -> Result<T, BillingError> {
        debug!("[billing] POST {path} ({} fields)", form.len());
        let resp = self
            .http
            .post(format!("{}{path}", self.api_url))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| BillingError::Provider(format!("POST {path} failed: {e}")))?;
        read_json(resp, path).await
    }
}

/// Form fields of a subscription checkout session.
pub(crate) fn checkout_form(params: &CheckoutParams) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = [
        ("customer", params.customer_id.as_str()),
        ("mode", "subscription"),
        ("payment_method_types[0]", "card"),
        ("line_items[0][price]", params.price_id.as_str()),
        ("line_items[0][quantity]", "1"),
        ("success_url", params.success_url.as_str()),
        ("cancel_url", params.cancel_url.as_str()),
        ("allow_promotion_codes", "true"),
        ("billing_address_collection", "required"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (key, value) in &params.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
        form.push((format!("subscription_data[metadata][{key}]"), value.clone()));
    }
    form
}

#[derive(Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct Portal {
    url: String,
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, BillingError> {
        let list: List<Created> = self.get("/v1/customers", &[("email", email), ("limit", "1")]).await?;
        Ok(list.data.into_iter().next().map(|c| c.id))
    }

    async fn create_customer(&self, email: &str, metadata: &[(String, String)]) -> Result<String, BillingError> {
        let mut form = vec![("email".to_string(), email.to_string())];
        form.extend(metadata.iter().map(|(k, v)| (format!("metadata[{k}]"), v.clone())));
        let created: Created = self.post("/v1/customers", &form).await?;
        Ok(created.id)
    }

    async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<CheckoutSession, BillingError> {
        self.post("/v1/checkout/sessions", &checkout_form(params)).await
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, BillingError> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        let portal: Portal = self.post("/v1/billing_portal/sessions", &form).await?;
        Ok(portal.url)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError> {
        self.get(&format!("/v1/subscriptions/{subscription_id}"), &[]).await
    }
}

/// Non-2xx responses carry `{"error":{"message":..}}`.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response, path: &str) -> Result<T, BillingError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| BillingError::Provider(format!("{path}: failed to read body: {e}")))?;
    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_string))
            .unwrap_or(text);
        return Err(BillingError::Provider(format!("{path}: HTTP {status}: {detail}")));
    }
    serde_json::from_str(&text).map_err(|e| BillingError::Provider(format!("{path}: invalid JSON: {e}")))
}
