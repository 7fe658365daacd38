//! Stripe REST client.
//!
//! Only the subscription read endpoint is needed here: handlers refetch the
//! live subscription state rather than trusting possibly-stale event
//! payloads.

use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{StripeErrorResponse, SubscriptionResource};

/// Default HTTP timeout for Stripe API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe API errors.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe returned an error response.
    #[error("Stripe API error ({error_type}): {message}")]
    Api {
        /// The error type reported by Stripe.
        error_type: String,
        /// Human-readable error message.
        message: String,
        /// Optional machine-readable error code.
        code: Option<String>,
    },

    /// Client misconfiguration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Stripe REST client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Create a new client with the given API key.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Configuration` if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StripeError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: crate::config::DEFAULT_STRIPE_API_BASE.to_string(),
        })
    }

    /// Override the API base URL. Used in tests to point at a mock server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch the live state of a subscription.
    ///
    /// Returns `Ok(None)` when Stripe no longer knows the subscription
    /// (HTTP 404); callers treat that as canceled.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-404 API error.
    pub async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionResource>, StripeError> {
        let url = format!("{}/subscriptions/{subscription_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.api_key, None::<&str>)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        handle_response(response).await.map(Some)
    }
}

/// Decode a Stripe response, surfacing API errors as `StripeError::Api`.
async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StripeError> {
    if response.status().is_success() {
        Ok(response.json::<T>().await?)
    } else {
        let status = response.status();
        match response.json::<StripeErrorResponse>().await {
            Ok(err) => Err(StripeError::Api {
                error_type: err.error.error_type,
                message: err.error.message,
                code: err.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}
