//! Payment provider wire types.
//!
//! The envelope carries `{id, type, created, data.object}`; the object shape
//! depends on the event type and is decoded per-handler. Optional fields are
//! defaulted because the provider omits fields freely across API versions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use coursebill_core::PurchaseKind;

/// The event types this reconciler handles.
///
/// Anything else parses into `Other` and is acknowledged without effect, so
/// new provider event types never fail the whole webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum EventType {
    /// `checkout.session.completed`
    CheckoutSessionCompleted,
    /// `invoice.paid`
    InvoicePaid,
    /// `customer.subscription.updated`
    SubscriptionUpdated,
    /// `customer.subscription.deleted`
    SubscriptionDeleted,
    /// `payment_method.attached`
    PaymentMethodAttached,
    /// `payment_method.detached`
    PaymentMethodDetached,
    /// Any event type without a registered handler.
    Other(String),
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "invoice.paid" => Self::InvoicePaid,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "payment_method.attached" => Self::PaymentMethodAttached,
            "payment_method.detached" => Self::PaymentMethodDetached,
            _ => Self::Other(s),
        }
    }
}

impl EventType {
    /// The provider's wire name for this event type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::InvoicePaid => "invoice.paid",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::SubscriptionDeleted => "customer.subscription.deleted",
            Self::PaymentMethodAttached => "payment_method.attached",
            Self::PaymentMethodDetached => "payment_method.detached",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    /// Provider-unique event id (deduplication key).
    pub id: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// When the event occurred at the provider (Unix seconds). Advisory
    /// only; the reconciler never orders by it.
    pub created: i64,
    /// Event data.
    pub data: EventData,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The event object; shape depends on the event type.
    pub object: serde_json::Value,
}

impl EventEnvelope {
    /// Decode a raw (already authenticated) payload into a typed envelope.
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if required envelope fields are
    /// absent or of the wrong shape.
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// The event's provider-side timestamp, if representable.
    #[must_use]
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }
}

/// Checkout session object (`checkout.session.completed`).
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    /// Session id. Natural key for the Payment row.
    pub id: String,
    /// Our user id, round-tripped through checkout creation.
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Payment status ("paid", "unpaid", "no_payment_required").
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Total amount in cents.
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// ISO currency code, lowercase.
    #[serde(default)]
    pub currency: Option<String>,
    /// Provider customer id.
    #[serde(default)]
    pub customer: Option<String>,
    /// Payment intent id (the charge reference).
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Provider invoice id, when the provider generated one.
    #[serde(default)]
    pub invoice: Option<String>,
    /// Provider subscription id, for subscription checkouts.
    #[serde(default)]
    pub subscription: Option<String>,
    /// Metadata attached at checkout creation.
    #[serde(default)]
    pub metadata: CheckoutMetadata,
}

/// Metadata our checkout creation attaches to the session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutMetadata {
    /// Discriminator for what the checkout purchased.
    #[serde(default)]
    pub purchase_kind: Option<PurchaseKind>,
    /// Course id, for course purchases.
    #[serde(default)]
    pub course_id: Option<String>,
    /// Plan id, for subscription checkouts.
    #[serde(default)]
    pub plan_id: Option<String>,
}

/// Invoice object (`invoice.paid`).
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceObject {
    /// Provider invoice id. Natural key.
    pub id: String,
    /// Provider customer id.
    #[serde(default)]
    pub customer: Option<String>,
    /// Provider subscription id this invoice bills.
    #[serde(default)]
    pub subscription: Option<String>,
    /// Amount paid, in cents.
    #[serde(default)]
    pub amount_paid: Option<i64>,
    /// ISO currency code, lowercase.
    #[serde(default)]
    pub currency: Option<String>,
}

/// Subscription resource, as carried in subscription events and as returned
/// by the provider's subscription read API.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionResource {
    /// Provider subscription id. Natural key.
    pub id: String,
    /// Provider customer id.
    #[serde(default)]
    pub customer: Option<String>,
    /// Provider status string ("active", "past_due", ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Start of the current period (Unix seconds).
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// End of the current period (Unix seconds).
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// Whether the subscription cancels at period end.
    #[serde(default)]
    pub cancel_at_period_end: bool,
    /// Metadata attached at checkout creation.
    #[serde(default)]
    pub metadata: SubscriptionMetadata,
}

/// Metadata our checkout creation attaches to the subscription.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionMetadata {
    /// Plan id the user subscribed to.
    #[serde(default)]
    pub plan_id: Option<String>,
}

/// Payment method object (`payment_method.attached` / `.detached`).
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethodObject {
    /// Provider payment-method id. Natural key.
    pub id: String,
    /// Provider customer id the method is attached to.
    #[serde(default)]
    pub customer: Option<String>,
    /// Card details, when the method is a card.
    #[serde(default)]
    pub card: Option<CardObject>,
}

/// Card details on a payment method.
#[derive(Debug, Clone, Deserialize)]
pub struct CardObject {
    /// Card brand (e.g. "visa").
    #[serde(default)]
    pub brand: Option<String>,
    /// Last four digits.
    #[serde(default)]
    pub last4: Option<String>,
    /// Expiry month (1-12).
    #[serde(default)]
    pub exp_month: Option<u8>,
    /// Expiry year.
    #[serde(default)]
    pub exp_year: Option<u16>,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}
