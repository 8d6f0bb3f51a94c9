//! # dash-billing
//!
//! Subscription billing through a hosted payment provider.
//!
//! Three operations reach the provider: starting a checkout, opening the
//! self-service portal, and consuming signed webhooks that keep the
//! subscription columns of the user profile in sync. The provider sits
//! behind [`PaymentProvider`] so [`BillingService`] runs against a fake in
//! tests; [`StripeClient`] is the production implementation.

pub mod provider;
pub mod stripe;
pub mod tiers;
pub mod webhook;

use std::sync::Arc;

use dash_core::config::BillingConfig;
use dash_core::time_util::{now_ms, rfc3339};
use dash_store::{ProfileStore, ProfileUpdate, SubscriptionState};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use provider::{CheckoutParams, CheckoutSession, PaymentProvider, Subscription};
pub use stripe::StripeClient;
pub use tiers::{BillingCycle, PriceCatalog, TierInfo};
pub use webhook::{WebhookEvent, compute_signature, verify_signature};

/// Metadata key linking provider objects to the dashboard user.
pub const USER_ID_KEY: &str = "supabase_user_id";
const PLAN_TYPE: &str = "autonomous";

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("{0}")]
    MissingField(String),

    #[error("{0}")]
    NoCustomer(String),

    #[error("signature error: {0}")]
    Signature(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("billing not configured: {0}")]
    Config(String),

    #[error("payment provider error: {0}")]
    Provider(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for BillingError {
    fn from(e: anyhow::Error) -> Self {
        Self::Store(format!("{e:#}"))
    }
}

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutRequest {
    pub price_id: Option<String>,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub tier_code: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub url: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

/// What a webhook delivery did.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Applied { user_id: String, update: ProfileUpdate },
    Ignored(String),
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct BillingService {
    provider: Arc<dyn PaymentProvider>,
    profiles: Arc<dyn ProfileStore>,
    config: BillingConfig,
    catalog: PriceCatalog,
    clock: Arc<dyn Fn() -> i64 + Send + Sync>,
}

impl BillingService {
    pub fn new(provider: Arc<dyn PaymentProvider>, profiles: Arc<dyn ProfileStore>, config: BillingConfig) -> Self {
        let catalog = PriceCatalog::new(config.prices.clone());
        Self { provider, profiles, config, catalog, clock: Arc::new(now_ms) }
    }

    /// Production wiring; requires the provider secret key.
    pub fn from_config(config: BillingConfig, profiles: Arc<dyn ProfileStore>) -> Result<Self, BillingError> {
        let secret = non_empty(config.secret_key.as_deref())
            .ok_or_else(|| BillingError::Config("provider secret key is not set".into()))?;
        let client = StripeClient::new(&config.api_url, secret)?;
        Ok(Self::new(Arc::new(client), profiles, config))
    }

    /// Replace the ms clock used for webhook tolerance and access fallbacks.
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> i64 + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn catalog(&self) -> &PriceCatalog {
        &self.catalog
    }

    fn origin<'a>(&'a self, origin: Option<&'a str>) -> &'a str {
        non_empty(origin).unwrap_or(self.config.public_origin.as_str()).trim_end_matches('/')
    }

    /// Start a subscription checkout, reusing the provider customer with the
    /// same email when one exists. A missing `priceId` is resolved from
    /// `tierCode` + `billingCycle` through the catalog.
    pub async fn checkout(&self, req: &CheckoutRequest, origin: Option<&str>) -> Result<CheckoutResponse, BillingError> {
        let tier_code = non_empty(req.tier_code.as_deref());
        let cycle = req.billing_cycle.unwrap_or_default();
        let price_id = non_empty(req.price_id.as_deref())
            .or_else(|| tier_code.and_then(|t| self.catalog.price_id(t, cycle)));
        let (Some(price_id), Some(user_id), Some(email)) =
            (price_id, non_empty(req.user_id.as_deref()), non_empty(req.user_email.as_deref()))
        else {
            return Err(BillingError::MissingField("Missing required fields: priceId, userId, userEmail".into()));
        };

        let customer_id = match self.provider.find_customer_by_email(email).await? {
            Some(id) => id,
            None => {
                let id = self
                    .provider
                    .create_customer(email, &[(USER_ID_KEY.to_string(), user_id.to_string())])
                    .await?;
                info!("[billing] created customer {id} for user {user_id}");
                id
            }
        };

        let origin = self.origin(origin);
        let params = CheckoutParams {
            customer_id,
            price_id: price_id.to_string(),
            success_url: format!("{origin}/settings?success=true&session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{origin}/?canceled=true"),
            metadata: vec![
                (USER_ID_KEY.to_string(), user_id.to_string()),
                ("tier_code".to_string(), tier_code.unwrap_or_default().to_string()),
                ("billing_cycle".to_string(), cycle.as_str().to_string()),
            ],
        };
        let session = self.provider.create_checkout_session(&params).await?;
        info!("[billing] checkout session {} for user {user_id} (price {price_id})", session.id);
        Ok(CheckoutResponse { url: session.url, session_id: session.id })
    }

    /// Portal session for a user that already has a provider customer.
    pub async fn portal(&self, user_id: &str, origin: Option<&str>) -> Result<PortalResponse, BillingError> {
        if user_id.trim().is_empty() {
            return Err(BillingError::MissingField("Missing required field: userId".into()));
        }
        let customer = self
            .profiles
            .profile(user_id)
            .await?
            .and_then(|p| p.stripe_customer_id)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| BillingError::NoCustomer("No subscription found for this user".into()))?;
        let return_url = format!("{}/settings", self.origin(origin));
        let url = self.provider.create_portal_session(&customer, &return_url).await?;
        Ok(PortalResponse { url })
    }

    // -----------------------------------------------------------------------
    // Webhooks
    // -----------------------------------------------------------------------

    /// Verify, decode and apply one webhook delivery.
    pub async fn handle_webhook(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookOutcome, BillingError> {
        let secret = non_empty(self.config.webhook_secret.as_deref())
            .ok_or_else(|| BillingError::Config("webhook secret is not set".into()))?;
        let signature = non_empty(signature).ok_or_else(|| BillingError::Signature("Missing signature".into()))?;
        let now_secs = (self.clock)() / 1000;
        verify_signature(payload, signature, secret, now_secs, self.config.webhook_tolerance_secs)?;

        let outcome = self.dispatch(WebhookEvent::parse(payload)?).await?;
        match &outcome {
            WebhookOutcome::Applied { user_id, update } => {
                info!("[billing] profile {user_id} updated: {}", update_label(update))
            }
            WebhookOutcome::Ignored(reason) => info!("[billing] webhook ignored: {reason}"),
        }
        Ok(outcome)
    }

    async fn dispatch(&self, event: WebhookEvent) -> Result<WebhookOutcome, BillingError> {
        match event {
            WebhookEvent::CheckoutCompleted { user_id, customer, subscription } => {
                let Some(user_id) = user_id else {
                    warn!("[billing] checkout completed without {USER_ID_KEY}");
                    return Ok(ignored("checkout without user id"));
                };
                let Some(subscription) = subscription else {
                    return Ok(ignored("checkout without subscription"));
                };
                let sub = self.provider.retrieve_subscription(&subscription).await?;
                self.apply_subscription(&user_id, &sub, customer).await
            }
            WebhookEvent::SubscriptionUpdated(obj) => {
                let sub = subscription_from(obj)?;
                let Some(user_id) = sub.metadata_value(USER_ID_KEY).map(str::to_string) else {
                    return Ok(ignored("subscription without user id"));
                };
                self.apply_subscription(&user_id, &sub, None).await
            }
            WebhookEvent::SubscriptionDeleted(obj) => {
                let sub = subscription_from(obj)?;
                let Some(user_id) = sub.metadata_value(USER_ID_KEY) else {
                    return Ok(ignored("subscription without user id"));
                };
                self.write(user_id, ProfileUpdate::Canceled).await
            }
            WebhookEvent::InvoicePaid { customer, subscription } => {
                let Some(subscription) = subscription else {
                    return Ok(ignored("invoice without subscription"));
                };
                let sub = self.provider.retrieve_subscription(&subscription).await?;
                let Some(user_id) = sub.metadata_value(USER_ID_KEY).map(str::to_string) else {
                    return Ok(ignored("subscription without user id"));
                };
                self.apply_subscription(&user_id, &sub, customer).await
            }
            WebhookEvent::InvoiceFailed { subscription } => {
                let Some(subscription) = subscription else {
                    return Ok(ignored("invoice without subscription"));
                };
                let sub = self.provider.retrieve_subscription(&subscription).await?;
                let Some(user_id) = sub.metadata_value(USER_ID_KEY) else {
                    return Ok(ignored("subscription without user id"));
                };
                self.write(user_id, ProfileUpdate::PastDue).await
            }
            WebhookEvent::Other(kind) => Ok(ignored(&format!("unhandled event {kind}"))),
        }
    }

    /// Subscription columns derived from a provider subscription.
    pub fn subscription_state(&self, sub: &Subscription, customer: Option<String>) -> Option<SubscriptionState> {
        let customer = customer.or_else(|| sub.customer.clone())?;
        let price_id = sub.price_id().map(str::to_string);
        let tier_code = sub.metadata_value("tier_code").map(str::to_string).or_else(|| {
            price_id.as_deref().and_then(|p| self.catalog.tier_for_price(p)).map(|info| info.tier_code)
        });
        let access_until = sub.period_end().map(|secs| secs * 1000).unwrap_or_else(|| (self.clock)());
        Some(SubscriptionState {
            stripe_customer_id: customer,
            subscription_id: sub.id.clone(),
            subscription_status: sub.status.clone(),
            subscription_price_id: price_id,
            plan_type: PLAN_TYPE.to_string(),
            tier_code,
            access_until: rfc3339(access_until),
            trial_ends_at: sub.trial_end.map(|secs| rfc3339(secs * 1000)),
        })
    }

    async fn apply_subscription(
        &self,
        user_id: &str,
        sub: &Subscription,
        customer: Option<String>,
    ) -> Result<WebhookOutcome, BillingError> {
        match self.subscription_state(sub, customer) {
            Some(state) => self.write(user_id, ProfileUpdate::Subscription(state)).await,
            None => Ok(ignored("subscription without customer")),
        }
    }

    async fn write(&self, user_id: &str, update: ProfileUpdate) -> Result<WebhookOutcome, BillingError> {
        self.profiles.update_profile(user_id, &update).await?;
        Ok(WebhookOutcome::Applied { user_id: user_id.to_string(), update })
    }
}

fn ignored(reason: &str) -> WebhookOutcome {
    WebhookOutcome::Ignored(reason.to_string())
}

fn subscription_from(obj: serde_json::Value) -> Result<Subscription, BillingError> {
    serde_json::from_value(obj).map_err(|e| BillingError::Malformed(format!("subscription object: {e}")))
}

fn update_label(update: &ProfileUpdate) -> &str {
    match update {
        ProfileUpdate::Subscription(state) => &state.subscription_status,
        ProfileUpdate::Canceled => "canceled",
        ProfileUpdate::PastDue => "past_due",
    }
}
