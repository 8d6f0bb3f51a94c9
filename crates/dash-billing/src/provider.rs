//! Payment provider capability and the provider objects this crate reads.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::BillingError;

/// Parameters of a subscription checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutParams {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Copied onto both the session and the subscription it creates.
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Subset of the provider's subscription object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default, deserialize_with = "expandable_id")]
    pub customer: Option<String>,
    pub status: String,
    #[serde(default)]
    pub items: SubscriptionItems,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub trial_end: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Price {
    pub id: String,
}

impl Subscription {
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first()?.price.as_ref().map(|p| p.id.as_str())
    }

    /// Period end in seconds; newer API versions only report it per item.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| self.items.data.first()?.current_period_end)
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// A reference field that is either an id string or an expanded object.
pub(crate) fn expandable_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) => Some(id),
        Some(Value::Object(obj)) => obj.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    })
}

/// Hosted billing provider operations used by the dashboard.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Id of the first customer with this email.
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, BillingError>;

    async fn create_customer(&self, email: &str, metadata: &[(String, String)]) -> Result<String, BillingError>;

    async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<CheckoutSession, BillingError>;

    /// Returns the portal URL.
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, BillingError>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError>;
}
