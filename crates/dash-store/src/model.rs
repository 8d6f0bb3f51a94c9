//! Rows persisted in the hosted database.

use dash_core::time_util::rfc3339;
use dash_core::types::{ExchangeConnection, Trade, User};
use serde::{Deserialize, Serialize};

/// A resolved caller: identity plus the bearer token the request came with.
///
/// Row-level security on the database is enforced per token, so reads and
/// writes made on the caller's behalf reuse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub token: String,
}

// ---------------------------------------------------------------------------
// trades
// ---------------------------------------------------------------------------

/// Extra execution details kept in the `metadata` JSON column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRowMetadata {
    pub original_order_id: String,
    pub commission_asset: Option<String>,
}

/// One row of the `trades` table. Unique on
/// `(trading_account_id, exchange_order_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    pub user_id: String,
    pub trading_account_id: String,
    pub exchange_platform: String,
    /// Execution id (not the order id) so every fill gets its own row.
    pub exchange_order_id: String,
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub price: f64,
    pub executed_quantity: f64,
    pub executed_price: f64,
    pub fee: f64,
    pub fee_currency: String,
    pub profit_loss: f64,
    pub opened_at: String,
    pub closed_at: String,
    pub metadata: TradeRowMetadata,
}

impl TradeRow {
    /// Map an execution to its storage row. Executions are instantaneous, so
    /// `opened_at == closed_at`.
    pub fn from_trade(user_id: &str, conn: &ExchangeConnection, trade: &Trade) -> Self {
        let at = rfc3339(trade.timestamp);
        Self {
            user_id: user_id.to_string(),
            trading_account_id: conn.id.clone(),
            exchange_platform: conn.exchange_platform.to_string(),
            exchange_order_id: trade.id.clone(),
            symbol: trade.symbol.clone(),
            side: trade.side.as_str().to_string(),
            quantity: trade.amount,
            price: trade.price,
            executed_quantity: trade.amount,
            executed_price: trade.price,
            fee: trade.fee,
            fee_currency: trade.fee_currency.clone().unwrap_or_else(|| "USDT".into()),
            profit_loss: trade.realized_pnl,
            opened_at: at.clone(),
            closed_at: at,
            metadata: TradeRowMetadata {
                original_order_id: trade.order_id.clone(),
                commission_asset: trade.fee_currency.clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// user_profiles
// ---------------------------------------------------------------------------

/// Subscription-related columns of `user_profiles`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub subscription_status: Option<String>,
    #[serde(default)]
    pub subscription_price_id: Option<String>,
    #[serde(default)]
    pub plan_type: Option<String>,
    #[serde(default)]
    pub tier_code: Option<String>,
    #[serde(default)]
    pub access_until: Option<String>,
    #[serde(default)]
    pub trial_ends_at: Option<String>,
}

/// Active subscription state written after a successful checkout/renewal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionState {
    pub stripe_customer_id: String,
    pub subscription_id: String,
    pub subscription_status: String,
    pub subscription_price_id: Option<String>,
    pub plan_type: String,
    pub tier_code: Option<String>,
    pub access_until: String,
    pub trial_ends_at: Option<String>,
}

/// A change to a user's subscription columns.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileUpdate {
    Subscription(SubscriptionState),
    /// Subscription deleted: status `canceled`, plan cleared.
    Canceled,
    /// Renewal payment failed: status `past_due`.
    PastDue,
}

impl ProfileUpdate {
    /// Column patch as sent to the database.
    pub fn to_patch(&self) -> serde_json::Value {
        match self {
            Self::Subscription(state) => serde_json::to_value(state).unwrap_or_default(),
            Self::Canceled => serde_json::json!({"subscription_status": "canceled", "plan_type": null}),
            Self::PastDue => serde_json::json!({"subscription_status": "past_due"}),
        }
    }

    /// Apply the same patch to an in-memory profile.
    pub fn apply_to(&self, profile: &mut UserProfile) {
        match self {
            Self::Subscription(s) => {
                profile.stripe_customer_id = Some(s.stripe_customer_id.clone());
                profile.subscription_id = Some(s.subscription_id.clone());
                profile.subscription_status = Some(s.subscription_status.clone());
                profile.subscription_price_id = s.subscription_price_id.clone();
                profile.plan_type = Some(s.plan_type.clone());
                profile.tier_code = s.tier_code.clone();
                profile.access_until = Some(s.access_until.clone());
                profile.trial_ends_at = s.trial_ends_at.clone();
            }
            Self::Canceled => {
                profile.subscription_status = Some("canceled".into());
                profile.plan_type = None;
            }
            Self::PastDue => profile.subscription_status = Some("past_due".into()),
        }
    }
}
