//! Core types for the coursebill reconciler.
//!
//! This crate provides the domain records the webhook reconciler materializes
//! from payment-provider events:
//!
//! - **Identifiers**: `UserId`, `CourseId`, `PlanId`
//! - **Payments**: `Payment`, `PaymentStatus`, `PurchaseKind`
//! - **Enrollments**: `Enrollment`
//! - **Invoices**: `Invoice`, `InvoiceStatus`
//! - **Subscriptions**: `UserSubscription`, `SubscriptionStatus`
//! - **Payment methods**: `PaymentMethod`
//!
//! # Natural keys
//!
//! Every record is keyed by a provider-assigned identifier (checkout session
//! id, subscription id, invoice id, payment-method id) or, for enrollments,
//! by the (user, course) pair. These keys are what make reconciliation
//! idempotent: replaying an event writes the same record under the same key.
//! Amounts are stored as `i64` integer cents to avoid floating point issues.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod enrollment;
pub mod ids;
pub mod payment;
pub mod payment_method;
pub mod subscription;

pub use enrollment::Enrollment;
pub use ids::{CourseId, IdError, PlanId, UserId};
pub use payment::{Invoice, InvoiceStatus, Payment, PaymentStatus, PurchaseKind};
pub use payment_method::PaymentMethod;
pub use subscription::{SubscriptionStatus, UserSubscription};
