//! Webhook endpoint.
//!
//! Receives provider event deliveries, authenticates them, and dispatches to
//! the per-event reconcile handlers. The provider delivers at-least-once and
//! unordered; every path below either completes its writes or returns a
//! non-2xx so the event is redelivered.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::handlers::reconcile;
use crate::state::AppState;
use crate::stripe::signature;
use crate::stripe::{EventEnvelope, EventType};

/// Acknowledgement body returned for every accepted event.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Always true; the provider only inspects the status code.
    pub received: bool,
}

/// `POST /webhooks/stripe`
///
/// The raw body is taken as a `String` because the signature covers the exact
/// bytes the provider sent; re-serializing a parsed value would not verify.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(secret) = &state.config.stripe_webhook_secret {
        let header = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::InvalidSignature)?;

        signature::verify(&body, header, secret).map_err(|e| {
            tracing::warn!(error = %e, "Webhook signature verification failed");
            ApiError::InvalidSignature
        })?;
    } else {
        tracing::warn!("No webhook signing secret configured, skipping signature verification");
    }

    let envelope = EventEnvelope::parse(&body).map_err(|e| ApiError::MalformedEvent(e.to_string()))?;

    tracing::info!(
        event_id = %envelope.id,
        event_type = %envelope.event_type,
        occurred_at = ?envelope.occurred_at(),
        "Processing webhook event"
    );

    dispatch(&state, &envelope).await?;

    Ok(Json(WebhookResponse { received: true }))
}

/// Route an authenticated event to its handler.
///
/// Event types without a handler are acknowledged so the provider does not
/// retry them forever.
async fn dispatch(state: &AppState, envelope: &EventEnvelope) -> Result<(), ApiError> {
    let object = &envelope.data.object;

    match &envelope.event_type {
        EventType::CheckoutSessionCompleted => reconcile::checkout_completed(state, object).await,
        EventType::InvoicePaid => reconcile::invoice_paid(state, object).await,
        EventType::SubscriptionUpdated => reconcile::subscription_updated(state, object).await,
        EventType::SubscriptionDeleted => reconcile::subscription_deleted(state, object).await,
        EventType::PaymentMethodAttached => reconcile::payment_method_attached(state, object).await,
        EventType::PaymentMethodDetached => reconcile::payment_method_detached(state, object).await,
        EventType::Other(event_type) => {
            tracing::debug!(event_type = %event_type, "Ignoring unhandled event type");
            Ok(())
        }
    }
}
