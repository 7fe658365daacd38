//! Application state.

use std::sync::Arc;

use coursebill_store::RocksStore;

use crate::config::ServiceConfig;
use crate::stripe::StripeClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Stripe client for live subscription fetches (optional).
    pub stripe: Option<Arc<StripeClient>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        let stripe = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key).map(|c| c.with_base_url(&config.stripe_api_base)) {
                Ok(client) => {
                    tracing::info!(api_base = %config.stripe_api_base, "Stripe integration enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if stripe.is_none() {
            tracing::warn!(
                "Stripe not configured - subscription events requiring a live fetch will fail"
            );
        }

        Self {
            store,
            config,
            stripe,
        }
    }
}
