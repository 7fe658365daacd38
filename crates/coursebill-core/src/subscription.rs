//! Subscription records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PlanId, UserId};

/// Status of a subscription, mirroring the provider's lifecycle.
///
/// The local row always holds the last status fetched from the provider;
/// the reconciler never invents transitions of its own. `Canceled` is
/// terminal at the provider, so once a row reaches it, refetches keep
/// returning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// In a trial period.
    Trialing,
    /// Active and paid up.
    Active,
    /// A renewal payment failed; the provider is retrying.
    PastDue,
    /// Canceled. Terminal.
    Canceled,
    /// Created but the initial payment has not completed.
    Incomplete,
    /// The initial payment window expired.
    IncompleteExpired,
    /// The provider exhausted payment retries.
    Unpaid,
    /// Collection is paused.
    Paused,
}

impl SubscriptionStatus {
    /// Parse a provider status string.
    ///
    /// Returns `None` for statuses this version does not know about; callers
    /// treat that as a soft outcome rather than a hard failure, so a new
    /// provider status does not wedge the webhook endpoint in a retry loop.
    #[must_use]
    pub fn from_provider(s: &str) -> Option<Self> {
        match s {
            "trialing" => Some(Self::Trialing),
            "active" => Some(Self::Active),
            "past_due" => Some(Self::PastDue),
            "canceled" => Some(Self::Canceled),
            "incomplete" => Some(Self::Incomplete),
            "incomplete_expired" => Some(Self::IncompleteExpired),
            "unpaid" => Some(Self::Unpaid),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }

    /// Whether this status is terminal at the provider.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Canceled | Self::IncompleteExpired)
    }
}

/// One row per active or historical subscription.
///
/// Keyed by the provider subscription id. Upserts are last-write-wins: every
/// write carries the provider's current truth for the whole row, never an
/// increment, so replays and concurrent writes converge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSubscription {
    /// The subscribing user.
    pub user_id: UserId,

    /// The plan the user subscribed to.
    pub plan_id: PlanId,

    /// Provider-reported status.
    pub status: SubscriptionStatus,

    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,

    /// End of the current billing period.
    pub current_period_end: DateTime<Utc>,

    /// Whether the subscription cancels at period end instead of renewing.
    pub cancel_at_period_end: bool,

    /// Provider subscription id. Natural key for upserts.
    pub provider_subscription_id: String,

    /// Provider customer id, used for reverse user lookup.
    pub provider_customer_id: String,

    /// When the row was first created locally.
    pub created_at: DateTime<Utc>,

    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}
