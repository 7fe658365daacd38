//! Stored payment instrument records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A stored card or payment instrument.
///
/// Keyed by the provider payment-method id. Newly attached methods are
/// non-default; promotion to default happens through the platform, not
/// through webhook events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// The owning user.
    pub user_id: UserId,

    /// Provider payment-method id. Natural key.
    pub provider_payment_method_id: String,

    /// Provider customer id, used for reverse user lookup.
    pub provider_customer_id: String,

    /// Card brand (e.g. "visa"), if known.
    pub brand: Option<String>,

    /// Last four digits of the card number, if known.
    pub last4: Option<String>,

    /// Card expiry month (1-12), if known.
    pub exp_month: Option<u8>,

    /// Card expiry year, if known.
    pub exp_year: Option<u16>,

    /// Whether this is the user's default method.
    pub is_default: bool,

    /// When the record was created locally.
    pub created_at: DateTime<Utc>,
}

impl PaymentMethod {
    /// Build a newly attached, non-default payment method.
    #[must_use]
    pub fn attached(
        user_id: UserId,
        provider_payment_method_id: impl Into<String>,
        provider_customer_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            provider_payment_method_id: provider_payment_method_id.into(),
            provider_customer_id: provider_customer_id.into(),
            brand: None,
            last4: None,
            exp_month: None,
            exp_year: None,
            is_default: false,
            created_at: Utc::now(),
        }
    }
}
