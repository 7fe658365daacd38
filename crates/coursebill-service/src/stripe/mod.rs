//! Payment provider integration.
//!
//! Wire types for the webhook event envelope and per-type payload objects,
//! the REST client used to refetch live subscription state, and webhook
//! signature verification.

pub mod client;
pub mod signature;
pub mod types;

pub use client::{StripeClient, StripeError};
pub use types::{
    CardObject, CheckoutMetadata, CheckoutSessionObject, EventEnvelope, EventType, InvoiceObject,
    PaymentMethodObject, SubscriptionMetadata, SubscriptionResource,
};
