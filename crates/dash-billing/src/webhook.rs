//! Signed webhook verification and event decoding.
//!
//! The signature header looks like `t=1700000000,v1=<hex>,v1=<hex>`; each
//! `v1` is HMAC-SHA256 of `"{t}.{payload}"` keyed with the endpoint secret.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::BillingError;

type HmacSha256 = Hmac<Sha256>;

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    hex::encode(signed_mac(secret, timestamp, payload).finalize().into_bytes())
}

/// Check `header` against `payload`. `now_secs` and `tolerance_secs` bound
/// the signed timestamp in both directions.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_secs: i64,
    tolerance_secs: i64,
) -> Result<(), BillingError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse::<i64>().ok(),
            Some(("v1", sig)) => candidates.push(sig),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or_else(|| BillingError::Signature("missing timestamp".into()))?;
    if candidates.is_empty() {
        return Err(BillingError::Signature("no v1 signature".into()));
    }
    if now_secs.abs_diff(timestamp) > u64::try_from(tolerance_secs).unwrap_or(0) {
        return Err(BillingError::Signature("timestamp outside tolerance".into()));
    }

    // verify_slice compares in constant time
    let matched = candidates
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|expected| signed_mac(secret, timestamp, payload).verify_slice(&expected).is_ok());
    if matched { Ok(()) } else { Err(BillingError::Signature("signature mismatch".into())) }
}

/// A decoded webhook event.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    CheckoutCompleted { user_id: Option<String>, customer: Option<String>, subscription: Option<String> },
    SubscriptionUpdated(Value),
    SubscriptionDeleted(Value),
    InvoicePaid { customer: Option<String>, subscription: Option<String> },
    InvoiceFailed { subscription: Option<String> },
    Other(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: Value,
}

fn ref_id(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(o) => o.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, BillingError> {
        let envelope: Envelope =
            serde_json::from_slice(payload).map_err(|e| BillingError::Malformed(format!("webhook payload: {e}")))?;
        let obj = envelope.data.object;
        Ok(match envelope.kind.as_str() {
            "checkout.session.completed" => Self::CheckoutCompleted {
                user_id: obj
                    .pointer("/metadata/supabase_user_id")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                customer: ref_id(&obj, "customer"),
                subscription: ref_id(&obj, "subscription"),
            },
            "customer.subscription.updated" => Self::SubscriptionUpdated(obj),
            "customer.subscription.deleted" => Self::SubscriptionDeleted(obj),
            "invoice.payment_succeeded" => Self::InvoicePaid {
                customer: ref_id(&obj, "customer"),
                subscription: invoice_subscription(&obj),
            },
            "invoice.payment_failed" => Self::InvoiceFailed { subscription: invoice_subscription(&obj) },
            other => Self::Other(other.to_string()),
        })
    }
}

/// Older API versions put the subscription at the top of the invoice, newer
/// ones under `parent.subscription_details`.
fn invoice_subscription(invoice: &Value) -> Option<String> {
    ref_id(invoice, "subscription")
        .or_else(|| invoice.pointer("/parent/subscription_details").and_then(|d| ref_id(d, "subscription")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn accepts_any_matching_v1() {
        let payload = br#"{"type":"ping"}"#;
        let good = compute_signature(SECRET, 1_700_000_000, payload);
        let header = format!("t=1700000000,v1={},v1={good},v0=ignored", "00".repeat(32));
        verify_signature(payload, &header, SECRET, 1_700_000_100, 300).unwrap();
    }

    #[test]
    fn rejects_tampered_stale_and_malformed() {
        let payload = br#"{"type":"ping"}"#;
        let sig = compute_signature(SECRET, 1_700_000_000, payload);
        let header = format!("t=1700000000,v1={sig}");

        assert!(verify_signature(br#"{"type":"pong"}"#, &header, SECRET, 1_700_000_000, 300).is_err());
        assert!(verify_signature(payload, &header, "whsec_other", 1_700_000_000, 300).is_err());
        assert!(verify_signature(payload, &header, SECRET, 1_700_000_301, 300).is_err());
        assert!(verify_signature(payload, &format!("v1={sig}"), SECRET, 1_700_000_000, 300).is_err());
        assert!(verify_signature(payload, "t=1700000000", SECRET, 1_700_000_000, 300).is_err());
    }

    #[test]
    fn extreme_timestamps_are_stale_not_fatal() {
        let payload = br#"{"type":"ping"}"#;
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={t},v1={}", compute_signature(SECRET, t, payload));
            let err = verify_signature(payload, &header, SECRET, 1_700_000_000, 300).unwrap_err();
            assert!(err.to_string().contains("tolerance"), "{err}");
        }
        let header = format!("t=1700000000,v1={}", compute_signature(SECRET, 1_700_000_000, payload));
        assert!(verify_signature(payload, &header, SECRET, 1_700_000_000, -1).is_err());
    }

    #[test]
    fn decodes_event_kinds() {
        let checkout = json!({"type": "checkout.session.completed", "data": {"object": {
            "customer": "cus_1", "subscription": "sub_1", "metadata": {"supabase_user_id": "u1"}
        }}});
        assert_eq!(
            WebhookEvent::parse(checkout.to_string().as_bytes()).unwrap(),
            WebhookEvent::CheckoutCompleted {
                user_id: Some("u1".into()),
                customer: Some("cus_1".into()),
                subscription: Some("sub_1".into()),
            }
        );

        let invoice = json!({"type": "invoice.payment_failed", "data": {"object": {
            "parent": {"subscription_details": {"subscription": "sub_2"}}
        }}});
        assert_eq!(
            WebhookEvent::parse(invoice.to_string().as_bytes()).unwrap(),
            WebhookEvent::InvoiceFailed { subscription: Some("sub_2".into()) }
        );

        let other = json!({"type": "charge.refunded", "data": {"object": {}}});
        assert_eq!(
            WebhookEvent::parse(other.to_string().as_bytes()).unwrap(),
            WebhookEvent::Other("charge.refunded".into())
        );
        assert!(matches!(WebhookEvent::parse(b"not json"), Err(BillingError::Malformed(_))));
    }
}
