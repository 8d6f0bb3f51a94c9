//! Shared application state: the aggregator and (optionally) billing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dash_aggregate::Aggregator;
use dash_billing::{BillingError, BillingService};
use dash_core::config::AppConfig;
use dash_exchange::{ClientPool, Connector, PlatformConnector};
use dash_store::{ConnectionStore, ProfileStore, RestStore, SessionResolver, TradeStore};
use tracing::{info, warn};

pub struct AppState {
    pub config: AppConfig,
    pub aggregator: Arc<Aggregator>,
    /// `None` when no provider secret key is configured.
    pub billing: Option<Arc<BillingService>>,
}

impl AppState {
    /// Wire any store + connector pair.
    pub fn build<S>(store: Arc<S>, connector: Arc<dyn Connector>, config: AppConfig) -> Self
    where
        S: SessionResolver + ConnectionStore + TradeStore + ProfileStore + 'static,
    {
        let aggregator = Arc::new(Aggregator::new(store.clone(), connector, config.watchlist.clone()));
        let billing = match BillingService::from_config(config.billing.clone(), store) {
            Ok(service) => Some(Arc::new(service)),
            Err(BillingError::Config(reason)) => {
                info!("[billing] disabled: {reason}");
                None
            }
            Err(e) => {
                warn!("[billing] failed to initialise: {e}");
                None
            }
        };
        Self { config, aggregator, billing }
    }

    /// Production wiring: hosted store over REST, pooled exchange adapters.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store = Arc::new(RestStore::new(&config.store)?);
        let pool = ClientPool::new(
            PlatformConnector::new(config.exchange.clone()),
            Duration::from_secs(config.exchange.client_ttl_secs),
        );
        Ok(Self::build(store, Arc::new(pool), config))
    }
}
