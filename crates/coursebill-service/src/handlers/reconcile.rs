//! Per-event reconcile handlers.
//!
//! Each handler turns one provider event into idempotent writes against the
//! store. Records are keyed by provider-assigned natural keys, so replays of
//! the same event converge on the same rows.
//!
//! Subscription state is never taken from the event payload. Deliveries
//! arrive unordered, so a handler that trusted the payload could let a stale
//! update overwrite a newer one. Instead the handlers refetch the live
//! subscription from the provider and apply that; a refetch after deletion
//! reports the subscription canceled (or gone entirely), so the terminal
//! state sticks.
//!
//! Soft outcomes (an unmapped customer, an unknown status string, a deletion
//! for a subscription never seen) log a warning and acknowledge without
//! writing. Returning an error there would put the provider in a retry loop
//! that can never succeed.

use chrono::{DateTime, Utc};
use std::str::FromStr;

use coursebill_core::{
    CourseId, Enrollment, Invoice, InvoiceStatus, Payment, PaymentMethod, PlanId, PurchaseKind,
    SubscriptionStatus, UserId, UserSubscription,
};
use coursebill_store::Store;

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{
    CheckoutSessionObject, InvoiceObject, PaymentMethodObject, StripeClient, SubscriptionResource,
};

/// Fallback currency when the provider omits one.
const DEFAULT_CURRENCY: &str = "usd";

/// Decode an event object into its typed payload.
fn decode<T: serde::de::DeserializeOwned>(object: &serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(object.clone()).map_err(|e| ApiError::MalformedEvent(e.to_string()))
}

/// Parse a UUID-backed id out of an event field.
fn parse_id<T: FromStr>(value: &str, field: &'static str) -> Result<T, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::MalformedEvent(format!("{field} is not a valid id: {value}")))
}

/// Convert a provider Unix timestamp into a `DateTime`.
fn period(ts: Option<i64>, field: &'static str) -> Result<DateTime<Utc>, ApiError> {
    let ts = ts.ok_or(ApiError::MissingField(field))?;
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| ApiError::MalformedEvent(format!("{field} is out of range: {ts}")))
}

/// The Stripe client, or an internal error when it was never configured.
fn stripe_client(state: &AppState) -> Result<&StripeClient, ApiError> {
    state
        .stripe
        .as_deref()
        .ok_or_else(|| ApiError::Internal("Stripe client not configured".to_string()))
}

/// Handle `checkout.session.completed`.
///
/// Branches on the purchase kind our checkout creation stamped into the
/// session metadata. Course purchases materialize a payment, an enrollment,
/// and an invoice; subscription checkouts sync the new subscription from the
/// provider.
pub async fn checkout_completed(
    state: &AppState,
    object: &serde_json::Value,
) -> Result<(), ApiError> {
    let session: CheckoutSessionObject = decode(object)?;

    if session.payment_status.as_deref() != Some("paid") {
        tracing::info!(
            session_id = %session.id,
            payment_status = ?session.payment_status,
            "Checkout session completed without payment, nothing to reconcile"
        );
        return Ok(());
    }

    let Some(kind) = session.metadata.purchase_kind else {
        tracing::warn!(
            session_id = %session.id,
            "Checkout session carries no purchase kind, not one of ours"
        );
        return Ok(());
    };

    match kind {
        PurchaseKind::CoursePurchase => course_purchase_completed(state, &session),
        PurchaseKind::Subscription => subscription_checkout_completed(state, &session).await,
    }
}

/// Record a paid course checkout: payment, enrollment, then invoice.
///
/// The writes are separate keyed inserts rather than one transaction. If the
/// process dies between them, redelivery replays the event and the inserts
/// that already landed report duplicates.
fn course_purchase_completed(
    state: &AppState,
    session: &CheckoutSessionObject,
) -> Result<(), ApiError> {
    let user_ref = session
        .client_reference_id
        .as_deref()
        .ok_or(ApiError::MissingField("client_reference_id"))?;
    let user_id: UserId = parse_id(user_ref, "client_reference_id")?;

    let course_ref = session
        .metadata
        .course_id
        .as_deref()
        .ok_or(ApiError::MissingField("metadata.course_id"))?;
    let course_id: CourseId = parse_id(course_ref, "metadata.course_id")?;

    let amount_cents = session.amount_total.unwrap_or(0);
    let currency = session
        .currency
        .clone()
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let payment = Payment::succeeded(
        user_id,
        Some(course_id),
        amount_cents,
        currency.clone(),
        &session.id,
        session.payment_intent.clone(),
    );
    if !state.store.insert_payment(&payment)? {
        tracing::info!(session_id = %session.id, "Payment already recorded, skipping");
    }

    let enrollment = Enrollment::new(user_id, course_id);
    if !state.store.insert_enrollment(&enrollment)? {
        tracing::info!(
            user_id = %user_id,
            course_id = %course_id,
            "User already enrolled, skipping"
        );
    }

    // One-time checkouts may carry no provider invoice; the session id then
    // doubles as the invoice key so replays still collapse onto one row.
    let provider_invoice_id = session
        .invoice
        .clone()
        .unwrap_or_else(|| session.id.clone());
    let invoice = Invoice {
        user_id,
        course_id: Some(course_id),
        subscription_id: None,
        amount_cents,
        currency,
        status: InvoiceStatus::Paid,
        provider_invoice_id,
        paid_at: Utc::now(),
    };
    if !state.store.insert_invoice(&invoice)? {
        tracing::info!(
            provider_invoice_id = %invoice.provider_invoice_id,
            "Invoice already recorded, skipping"
        );
    }

    tracing::info!(
        user_id = %user_id,
        course_id = %course_id,
        amount_cents,
        "Course purchase reconciled"
    );
    Ok(())
}

/// Record a completed subscription checkout by syncing the live subscription.
async fn subscription_checkout_completed(
    state: &AppState,
    session: &CheckoutSessionObject,
) -> Result<(), ApiError> {
    let subscription_id = session
        .subscription
        .as_deref()
        .ok_or(ApiError::MissingField("subscription"))?;

    let user_ref = session
        .client_reference_id
        .as_deref()
        .ok_or(ApiError::MissingField("client_reference_id"))?;
    let user_id: UserId = parse_id(user_ref, "client_reference_id")?;

    let client = stripe_client(state)?;
    let Some(resource) = client.get_subscription(subscription_id).await? else {
        tracing::warn!(
            subscription_id = %subscription_id,
            "Provider no longer knows checkout subscription, nothing to record"
        );
        return Ok(());
    };

    // The plan id lives in the subscription metadata; the checkout session
    // metadata is the fallback for providers that only stamp the session.
    let plan_ref = resource
        .metadata
        .plan_id
        .as_deref()
        .or(session.metadata.plan_id.as_deref());
    let Some(plan_ref) = plan_ref else {
        tracing::warn!(
            subscription_id = %subscription_id,
            "Subscription carries no plan id, not one of ours"
        );
        return Ok(());
    };
    let plan_id: PlanId = parse_id(plan_ref, "metadata.plan_id")?;

    apply_subscription(state, &resource, user_id, plan_id)
}

/// Handle `invoice.paid`.
///
/// Records the invoice and, when the invoice bills a subscription, resyncs
/// that subscription so the local period bounds advance with the renewal.
pub async fn invoice_paid(state: &AppState, object: &serde_json::Value) -> Result<(), ApiError> {
    let invoice: InvoiceObject = decode(object)?;

    let Some(customer) = invoice.customer.as_deref() else {
        tracing::warn!(invoice_id = %invoice.id, "Invoice carries no customer, skipping");
        return Ok(());
    };
    let Some(user_id) = state.store.find_user_by_customer(customer)? else {
        tracing::warn!(
            invoice_id = %invoice.id,
            customer = %customer,
            "No user known for customer, skipping invoice"
        );
        return Ok(());
    };

    if let Some(subscription_id) = invoice.subscription.as_deref() {
        sync_subscription(state, subscription_id, user_id).await?;
    }

    let row = Invoice {
        user_id,
        course_id: None,
        subscription_id: invoice.subscription.clone(),
        amount_cents: invoice.amount_paid.unwrap_or(0),
        currency: invoice
            .currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        status: InvoiceStatus::Paid,
        provider_invoice_id: invoice.id.clone(),
        paid_at: Utc::now(),
    };
    if state.store.insert_invoice(&row)? {
        tracing::info!(
            invoice_id = %invoice.id,
            user_id = %user_id,
            amount_cents = row.amount_cents,
            "Invoice reconciled"
        );
    } else {
        tracing::info!(invoice_id = %invoice.id, "Invoice already recorded, skipping");
    }

    Ok(())
}

/// Handle `customer.subscription.updated`.
///
/// The event payload only identifies the subscription; the state written
/// comes from a live refetch.
pub async fn subscription_updated(
    state: &AppState,
    object: &serde_json::Value,
) -> Result<(), ApiError> {
    let resource: SubscriptionResource = decode(object)?;

    let existing = state.store.get_subscription(&resource.id)?;
    let user_id = match &existing {
        Some(row) => row.user_id,
        None => {
            let Some(customer) = resource.customer.as_deref() else {
                tracing::warn!(
                    subscription_id = %resource.id,
                    "Subscription update carries no customer and no local row, skipping"
                );
                return Ok(());
            };
            match state.store.find_user_by_customer(customer)? {
                Some(user_id) => user_id,
                None => {
                    tracing::warn!(
                        subscription_id = %resource.id,
                        customer = %customer,
                        "No user known for customer, skipping subscription update"
                    );
                    return Ok(());
                }
            }
        }
    };

    let client = stripe_client(state)?;
    let Some(fetched) = client.get_subscription(&resource.id).await? else {
        // Gone at the provider. Locally that is a cancellation.
        if state.store.cancel_subscription(&resource.id)? {
            tracing::info!(
                subscription_id = %resource.id,
                "Subscription gone at provider, canceled locally"
            );
        }
        return Ok(());
    };

    let plan_ref = fetched.metadata.plan_id.clone();
    let plan_id = match (plan_ref, &existing) {
        (Some(plan_ref), _) => parse_id(&plan_ref, "metadata.plan_id")?,
        (None, Some(row)) => row.plan_id,
        (None, None) => {
            tracing::warn!(
                subscription_id = %resource.id,
                "Subscription carries no plan id and no local row, skipping"
            );
            return Ok(());
        }
    };

    apply_subscription(state, &fetched, user_id, plan_id)
}

/// Handle `customer.subscription.deleted`.
///
/// Deletion is terminal at the provider, so no refetch is needed; the local
/// row is marked canceled directly.
#[allow(clippy::unused_async)]
pub async fn subscription_deleted(
    state: &AppState,
    object: &serde_json::Value,
) -> Result<(), ApiError> {
    let resource: SubscriptionResource = decode(object)?;

    if state.store.cancel_subscription(&resource.id)? {
        tracing::info!(subscription_id = %resource.id, "Subscription canceled");
    } else {
        tracing::info!(
            subscription_id = %resource.id,
            "Deletion for unknown subscription, nothing to cancel"
        );
    }

    Ok(())
}

/// Handle `payment_method.attached`.
#[allow(clippy::unused_async)]
pub async fn payment_method_attached(
    state: &AppState,
    object: &serde_json::Value,
) -> Result<(), ApiError> {
    let method: PaymentMethodObject = decode(object)?;

    let Some(customer) = method.customer.as_deref() else {
        tracing::warn!(
            payment_method_id = %method.id,
            "Payment method carries no customer, skipping"
        );
        return Ok(());
    };
    let Some(user_id) = state.store.find_user_by_customer(customer)? else {
        tracing::warn!(
            payment_method_id = %method.id,
            customer = %customer,
            "No user known for customer, skipping payment method"
        );
        return Ok(());
    };

    let mut row = PaymentMethod::attached(user_id, &method.id, customer);
    if let Some(card) = &method.card {
        row.brand = card.brand.clone();
        row.last4 = card.last4.clone();
        row.exp_month = card.exp_month;
        row.exp_year = card.exp_year;
    }

    if state.store.insert_payment_method(&row)? {
        tracing::info!(
            payment_method_id = %method.id,
            user_id = %user_id,
            "Payment method attached"
        );
    } else {
        tracing::info!(
            payment_method_id = %method.id,
            "Payment method already recorded, skipping"
        );
    }

    Ok(())
}

/// Handle `payment_method.detached`.
#[allow(clippy::unused_async)]
pub async fn payment_method_detached(
    state: &AppState,
    object: &serde_json::Value,
) -> Result<(), ApiError> {
    let method: PaymentMethodObject = decode(object)?;

    if state.store.delete_payment_method(&method.id)? {
        tracing::info!(payment_method_id = %method.id, "Payment method detached");
    } else {
        tracing::info!(
            payment_method_id = %method.id,
            "Detach for unknown payment method, nothing to delete"
        );
    }

    Ok(())
}

/// Refetch a subscription and write its live state.
///
/// Used when an event references a subscription whose row may not exist yet.
/// A 404 from the provider cancels any local row.
async fn sync_subscription(
    state: &AppState,
    subscription_id: &str,
    user_id: UserId,
) -> Result<(), ApiError> {
    let client = stripe_client(state)?;
    let Some(resource) = client.get_subscription(subscription_id).await? else {
        if state.store.cancel_subscription(subscription_id)? {
            tracing::info!(
                subscription_id = %subscription_id,
                "Subscription gone at provider, canceled locally"
            );
        }
        return Ok(());
    };

    let existing = state.store.get_subscription(subscription_id)?;
    let plan_id = match (resource.metadata.plan_id.clone(), &existing) {
        (Some(plan_ref), _) => parse_id(&plan_ref, "metadata.plan_id")?,
        (None, Some(row)) => row.plan_id,
        (None, None) => {
            tracing::warn!(
                subscription_id = %subscription_id,
                "Subscription carries no plan id and no local row, skipping sync"
            );
            return Ok(());
        }
    };

    apply_subscription(state, &resource, user_id, plan_id)
}

/// Write a fetched subscription resource as the local row.
///
/// Last-write-wins on the whole row; the store preserves the original
/// `created_at` across upserts.
fn apply_subscription(
    state: &AppState,
    resource: &SubscriptionResource,
    user_id: UserId,
    plan_id: PlanId,
) -> Result<(), ApiError> {
    let Some(status_str) = resource.status.as_deref() else {
        tracing::warn!(subscription_id = %resource.id, "Subscription has no status, skipping");
        return Ok(());
    };
    let Some(status) = SubscriptionStatus::from_provider(status_str) else {
        tracing::warn!(
            subscription_id = %resource.id,
            status = %status_str,
            "Unknown subscription status, skipping"
        );
        return Ok(());
    };

    let customer = resource
        .customer
        .clone()
        .ok_or(ApiError::MissingField("customer"))?;

    let now = Utc::now();
    let subscription = UserSubscription {
        user_id,
        plan_id,
        status,
        current_period_start: period(resource.current_period_start, "current_period_start")?,
        current_period_end: period(resource.current_period_end, "current_period_end")?,
        cancel_at_period_end: resource.cancel_at_period_end,
        provider_subscription_id: resource.id.clone(),
        provider_customer_id: customer,
        created_at: now,
        updated_at: now,
    };

    state.store.upsert_subscription(&subscription)?;
    tracing::info!(
        subscription_id = %resource.id,
        user_id = %user_id,
        status = ?status,
        "Subscription state written"
    );
    Ok(())
}
