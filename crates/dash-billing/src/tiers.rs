//! Price catalog: subscription tiers ↔ provider price ids.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    fn key_suffix(self) -> &'static str {
        match self {
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierInfo {
    pub tier_code: String,
    pub billing_cycle: BillingCycle,
}

/// Catalog keyed `{TIER}_{MONTHLY|YEARLY}` (e.g. `A2_YEARLY`).
#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    prices: HashMap<String, String>,
}

impl PriceCatalog {
    pub fn new(prices: HashMap<String, String>) -> Self {
        Self { prices }
    }

    pub fn price_id(&self, tier_code: &str, cycle: BillingCycle) -> Option<&str> {
        self.prices.get(&format!("{tier_code}_{}", cycle.key_suffix())).map(String::as_str)
    }

    /// Reverse lookup; keys that do not split into tier and cycle are skipped.
    pub fn tier_for_price(&self, price_id: &str) -> Option<TierInfo> {
        self.prices.iter().filter(|(_, id)| id.as_str() == price_id).find_map(|(key, _)| {
            let (tier, cycle) = key.split_once('_')?;
            let billing_cycle = match cycle {
                "MONTHLY" => BillingCycle::Monthly,
                "YEARLY" => BillingCycle::Yearly,
                _ => return None,
            };
            Some(TierInfo { tier_code: tier.to_string(), billing_cycle })
        })
    }
}
