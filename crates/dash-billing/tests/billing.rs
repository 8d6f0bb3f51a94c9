//! Billing service flows against a scripted provider and the in-memory store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dash_billing::*;
use dash_core::config::BillingConfig;
use dash_store::{MemoryStore, ProfileStore, UserProfile};
use serde_json::json;

const SECRET: &str = "whsec_test";
const NOW_SECS: i64 = 1_709_802_300;

#[derive(Default)]
struct FakeProvider {
    customers: Mutex<HashMap<String, String>>,
    subscriptions: HashMap<String, Subscription>,
    checkouts: Mutex<Vec<CheckoutParams>>,
    portals: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, BillingError> {
        Ok(self.customers.lock().unwrap().get(email).cloned())
    }

    async fn create_customer(&self, email: &str, _metadata: &[(String, String)]) -> Result<String, BillingError> {
        let mut customers = self.customers.lock().unwrap();
        let id = format!("cus_{}", customers.len() + 1);
        customers.insert(email.to_string(), id.clone());
        Ok(id)
    }

    async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<CheckoutSession, BillingError> {
        self.checkouts.lock().unwrap().push(params.clone());
        Ok(CheckoutSession { id: "cs_1".into(), url: Some("https://pay/cs_1".into()) })
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, BillingError> {
        self.portals.lock().unwrap().push((customer_id.to_string(), return_url.to_string()));
        Ok(format!("https://portal/{customer_id}"))
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError> {
        self.subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| BillingError::Provider(format!("no such subscription {subscription_id}")))
    }
}

fn subscription(id: &str, tier_code: &str, price: &str) -> Subscription {
    serde_json::from_value(json!({
        "id": id,
        "customer": "cus_1",
        "status": "active",
        "items": {"data": [{"price": {"id": price}, "current_period_end": 1_712_000_000}]},
        "metadata": {"supabase_user_id": "u1", "tier_code": tier_code, "billing_cycle": "monthly"}
    }))
    .unwrap()
}

fn config() -> BillingConfig {
    BillingConfig {
        webhook_secret: Some(SECRET.into()),
        public_origin: "https://dash.example".into(),
        ..BillingConfig::default()
    }
}

fn service(provider: Arc<FakeProvider>, store: Arc<MemoryStore>) -> BillingService {
    BillingService::new(provider, store, config()).with_clock(Arc::new(|| NOW_SECS * 1000))
}

fn signed(payload: &serde_json::Value) -> (Vec<u8>, String) {
    let body = payload.to_string().into_bytes();
    let header = format!("t={NOW_SECS},v1={}", compute_signature(SECRET, NOW_SECS, &body));
    (body, header)
}

// ---------------------------------------------------------------------------
// Checkout / portal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn checkout_requires_fields() {
    let svc = service(Arc::default(), Arc::new(MemoryStore::new()));
    let req = CheckoutRequest { user_id: Some("u1".into()), ..Default::default() };
    let err = svc.checkout(&req, None).await.unwrap_err();
    assert!(matches!(err, BillingError::MissingField(_)));
    assert_eq!(err.to_string(), "Missing required fields: priceId, userId, userEmail");
}

#[tokio::test]
async fn checkout_reuses_customer_and_tags_metadata() {
    let provider = Arc::new(FakeProvider::default());
    provider.customers.lock().unwrap().insert("a@b.c".into(), "cus_existing".into());
    let svc = service(provider.clone(), Arc::new(MemoryStore::new()));

    let req = CheckoutRequest {
        user_id: Some("u1".into()),
        user_email: Some("a@b.c".into()),
        tier_code: Some("A2".into()),
        billing_cycle: Some(BillingCycle::Yearly),
        ..Default::default()
    };
    let resp = svc.checkout(&req, None).await.unwrap();
    assert_eq!(resp.session_id, "cs_1");
    assert_eq!(resp.url.as_deref(), Some("https://pay/cs_1"));

    let params = provider.checkouts.lock().unwrap()[0].clone();
    assert_eq!(params.customer_id, "cus_existing");
    assert_eq!(params.price_id, "price_1SnNEhCX3wuf0Ms8fWT3Hnbo");
    assert_eq!(params.success_url, "https://dash.example/settings?success=true&session_id={CHECKOUT_SESSION_ID}");
    assert_eq!(params.cancel_url, "https://dash.example/?canceled=true");
    assert!(params.metadata.contains(&("billing_cycle".into(), "yearly".into())));
    assert!(params.metadata.contains(&("supabase_user_id".into(), "u1".into())));
}

#[tokio::test]
async fn checkout_creates_missing_customer() {
    let provider = Arc::new(FakeProvider::default());
    let svc = service(provider.clone(), Arc::new(MemoryStore::new()));
    let req = CheckoutRequest {
        price_id: Some("price_x".into()),
        user_id: Some("u1".into()),
        user_email: Some("new@b.c".into()),
        ..Default::default()
    };
    svc.checkout(&req, Some("https://other.example/")).await.unwrap();

    let params = provider.checkouts.lock().unwrap()[0].clone();
    assert_eq!(params.customer_id, "cus_1");
    assert_eq!(params.cancel_url, "https://other.example/?canceled=true");
    assert!(params.metadata.contains(&("tier_code".into(), String::new())));
    assert!(params.metadata.contains(&("billing_cycle".into(), "monthly".into())));
}

#[tokio::test]
async fn portal_needs_a_customer() {
    let provider = Arc::new(FakeProvider::default());
    let store = Arc::new(MemoryStore::new().with_profile(UserProfile {
        id: "u2".into(),
        stripe_customer_id: Some("cus_9".into()),
        ..Default::default()
    }));
    let svc = service(provider.clone(), store);

    assert!(matches!(svc.portal("u1", None).await, Err(BillingError::NoCustomer(_))));
    let resp = svc.portal("u2", None).await.unwrap();
    assert_eq!(resp.url, "https://portal/cus_9");
    assert_eq!(provider.portals.lock().unwrap()[0].1, "https://dash.example/settings");
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn webhook_rejects_unverified_deliveries() {
    let svc = service(Arc::default(), Arc::new(MemoryStore::new()));
    let (body, header) = signed(&json!({"type": "ping", "data": {"object": {}}}));

    assert!(matches!(svc.handle_webhook(&body, None).await, Err(BillingError::Signature(_))));
    let tampered = format!("{header}0");
    assert!(matches!(svc.handle_webhook(&body, Some(&tampered)).await, Err(BillingError::Signature(_))));

    let unconfigured = BillingService::new(
        Arc::new(FakeProvider::default()),
        Arc::new(MemoryStore::new()),
        BillingConfig::default(),
    );
    assert!(matches!(unconfigured.handle_webhook(&body, Some(&header)).await, Err(BillingError::Config(_))));
}

#[tokio::test]
async fn checkout_completed_activates_profile() {
    let provider = Arc::new(FakeProvider {
        subscriptions: HashMap::from([("sub_1".into(), subscription("sub_1", "", "price_1SnLpwCX3wuf0Ms89rfUI0iA"))]),
        ..Default::default()
    });
    let store = Arc::new(MemoryStore::new());
    let svc = service(provider, store.clone());

    let (body, header) = signed(&json!({"type": "checkout.session.completed", "data": {"object": {
        "customer": "cus_1", "subscription": "sub_1", "metadata": {"supabase_user_id": "u1"}
    }}}));
    let outcome = svc.handle_webhook(&body, Some(&header)).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Applied { ref user_id, .. } if user_id == "u1"));

    let profile = store.profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_1"));
    assert_eq!(profile.subscription_status.as_deref(), Some("active"));
    assert_eq!(profile.plan_type.as_deref(), Some("autonomous"));
    // empty metadata tier falls back to the catalog
    assert_eq!(profile.tier_code.as_deref(), Some("A3"));
    assert_eq!(profile.access_until.as_deref(), Some("2024-04-01T19:33:20.000Z"));
}

#[tokio::test]
async fn checkout_without_user_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(Arc::default(), store.clone());
    let (body, header) = signed(&json!({"type": "checkout.session.completed", "data": {"object": {
        "customer": "cus_1", "subscription": "sub_1"
    }}}));
    let outcome = svc.handle_webhook(&body, Some(&header)).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored(_)));
    assert!(store.profile("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn subscription_lifecycle_events() {
    let provider = Arc::new(FakeProvider {
        subscriptions: HashMap::from([("sub_1".into(), subscription("sub_1", "A1", "price_x"))]),
        ..Default::default()
    });
    let store = Arc::new(MemoryStore::new());
    let svc = service(provider, store.clone());

    let updated = json!({
        "id": "sub_1", "customer": "cus_1", "status": "trialing", "trial_end": 1_710_000_000,
        "items": {"data": [{"price": {"id": "price_x"}}]},
        "metadata": {"supabase_user_id": "u1", "tier_code": "A4"}
    });
    let (body, header) = signed(&json!({"type": "customer.subscription.updated", "data": {"object": updated}}));
    svc.handle_webhook(&body, Some(&header)).await.unwrap();
    let profile = store.profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.subscription_status.as_deref(), Some("trialing"));
    assert_eq!(profile.tier_code.as_deref(), Some("A4"));
    assert!(profile.trial_ends_at.is_some());
    // no period end: access runs until now
    assert_eq!(profile.access_until.as_deref(), Some("2024-03-07T09:05:00.000Z"));

    let (body, header) = signed(&json!({"type": "invoice.payment_failed", "data": {"object": {"subscription": "sub_1"}}}));
    svc.handle_webhook(&body, Some(&header)).await.unwrap();
    assert_eq!(store.profile("u1").await.unwrap().unwrap().subscription_status.as_deref(), Some("past_due"));

    let (body, header) = signed(&json!({"type": "invoice.payment_succeeded", "data": {"object": {
        "customer": "cus_1", "subscription": "sub_1"
    }}}));
    svc.handle_webhook(&body, Some(&header)).await.unwrap();
    let profile = store.profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.subscription_status.as_deref(), Some("active"));
    assert_eq!(profile.tier_code.as_deref(), Some("A1"));

    let (body, header) = signed(&json!({"type": "customer.subscription.deleted", "data": {"object": {
        "id": "sub_1", "customer": "cus_1", "status": "canceled", "metadata": {"supabase_user_id": "u1"}
    }}}));
    svc.handle_webhook(&body, Some(&header)).await.unwrap();
    let profile = store.profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.subscription_status.as_deref(), Some("canceled"));
    assert_eq!(profile.plan_type, None);
}

#[tokio::test]
async fn unknown_events_are_acknowledged() {
    let svc = service(Arc::default(), Arc::new(MemoryStore::new()));
    let (body, header) = signed(&json!({"type": "charge.refunded", "data": {"object": {}}}));
    assert!(matches!(svc.handle_webhook(&body, Some(&header)).await.unwrap(), WebhookOutcome::Ignored(_)));
}
