//! Payment and invoice records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CourseId, UserId};

/// What a completed checkout session purchased.
///
/// Carried as a discriminator in the checkout metadata. Matching on this enum
/// is exhaustive, so adding a new purchase kind forces every call site to
/// handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseKind {
    /// A one-time purchase of a single course.
    CoursePurchase,
    /// The start of a recurring subscription.
    Subscription,
}

/// Status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// The charge went through.
    Succeeded,
    /// The charge failed.
    Failed,
    /// The charge was refunded after succeeding.
    Refunded,
}

/// One row per completed checkout.
///
/// Keyed by the provider's checkout-session id, which is unique per checkout:
/// at most one `Payment` exists per session, no matter how many times the
/// completion event is delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// The purchasing user.
    pub user_id: UserId,

    /// The purchased course. `None` for subscription payments.
    pub course_id: Option<CourseId>,

    /// Amount charged, in integer cents.
    pub amount_cents: i64,

    /// ISO currency code, lowercase (e.g. "eur").
    pub currency: String,

    /// Payment status.
    pub status: PaymentStatus,

    /// Provider checkout-session id. Natural key.
    pub checkout_session_id: String,

    /// Provider charge / payment-intent id, if present on the event.
    pub charge_id: Option<String>,

    /// When the record was created locally.
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Build a succeeded payment for a completed checkout session.
    #[must_use]
    pub fn succeeded(
        user_id: UserId,
        course_id: Option<CourseId>,
        amount_cents: i64,
        currency: impl Into<String>,
        checkout_session_id: impl Into<String>,
        charge_id: Option<String>,
    ) -> Self {
        Self {
            user_id,
            course_id,
            amount_cents,
            currency: currency.into(),
            status: PaymentStatus::Succeeded,
            checkout_session_id: checkout_session_id.into(),
            charge_id,
            created_at: Utc::now(),
        }
    }
}

/// Status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// The invoice has been paid.
    Paid,
    /// The invoice is awaiting payment.
    Open,
    /// The invoice was voided.
    Void,
}

/// A billing record tied to a course purchase or a subscription period.
///
/// Keyed by the provider invoice id; inserting an invoice that already exists
/// is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// The billed user.
    pub user_id: UserId,

    /// The course, for course-purchase invoices.
    pub course_id: Option<CourseId>,

    /// The provider subscription id, for subscription-period invoices.
    pub subscription_id: Option<String>,

    /// Amount, in integer cents.
    pub amount_cents: i64,

    /// ISO currency code, lowercase.
    pub currency: String,

    /// Invoice status.
    pub status: InvoiceStatus,

    /// Provider invoice id. Natural key.
    pub provider_invoice_id: String,

    /// When the invoice was paid.
    pub paid_at: DateTime<Utc>,
}
