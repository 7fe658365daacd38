//! `RocksDB` storage layer for coursebill.
//!
//! This crate holds the records the webhook reconciler materializes:
//! payments, enrollments, invoices, subscriptions, and payment methods,
//! each in its own column family keyed by a provider-assigned natural key.
//!
//! # Write semantics
//!
//! The reconciler consumes an at-least-once event feed, so every write here
//! is safe to replay:
//!
//! - `insert_*` operations are insert-if-absent. A duplicate insert returns
//!   `Ok(false)` and leaves the existing row untouched.
//! - `upsert_subscription` is last-write-wins: the caller always supplies the
//!   provider's current truth for the whole row.
//! - `delete_payment_method` on an absent row returns `Ok(false)`, not an
//!   error.
//!
//! Mutations are serialized through a store-level write lock, so the
//! check-then-put sequences behind these semantics are atomic per natural
//! key even under concurrent webhook deliveries.
//!
//! A `customer_users` column family maps provider customer ids to internal
//! user ids; it is maintained in the same atomic batch as subscription and
//! payment-method writes and backs the reverse lookup handlers need.
//!
//! # Example
//!
//! ```no_run
//! use coursebill_store::{RocksStore, Store};
//! use coursebill_core::{Enrollment, UserId, CourseId};
//!
//! let store = RocksStore::open("/tmp/coursebill-db").unwrap();
//!
//! let enrollment = Enrollment::new(UserId::generate(), CourseId::generate());
//! let inserted = store.insert_enrollment(&enrollment).unwrap();
//! assert!(inserted);
//!
//! // Replaying the same event is a no-op.
//! let inserted = store.insert_enrollment(&enrollment).unwrap();
//! assert!(!inserted);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use coursebill_core::{
    CourseId, Enrollment, Invoice, Payment, PaymentMethod, UserId, UserSubscription,
};

/// The storage trait defining all reconciler database operations.
///
/// Abstracts the storage layer so tests and alternative backends can swap in
/// their own implementation.
pub trait Store: Send + Sync {
    // =========================================================================
    // Payments
    // =========================================================================

    /// Insert a payment keyed by its checkout session id, if absent.
    ///
    /// Returns `false` if a payment with that session id already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_payment(&self, payment: &Payment) -> Result<bool>;

    /// Get a payment by provider checkout-session id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_payment(&self, checkout_session_id: &str) -> Result<Option<Payment>>;

    // =========================================================================
    // Enrollments
    // =========================================================================

    /// Insert an enrollment keyed by (user, course), if absent.
    ///
    /// Returns `false` if the pair is already enrolled.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<bool>;

    /// Get an enrollment by (user, course).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_enrollment(&self, user_id: &UserId, course_id: &CourseId)
        -> Result<Option<Enrollment>>;

    /// List all enrollments for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_enrollments(&self, user_id: &UserId) -> Result<Vec<Enrollment>>;

    // =========================================================================
    // Invoices
    // =========================================================================

    /// Insert an invoice keyed by its provider invoice id, if absent.
    ///
    /// Returns `false` if an invoice with that id already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_invoice(&self, invoice: &Invoice) -> Result<bool>;

    /// Get an invoice by provider invoice id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_invoice(&self, provider_invoice_id: &str) -> Result<Option<Invoice>>;

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Insert or replace a subscription keyed by its provider subscription id.
    ///
    /// Last-write-wins; also records the customer-to-user mapping atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn upsert_subscription(&self, subscription: &UserSubscription) -> Result<()>;

    /// Get a subscription by provider subscription id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_subscription(&self, provider_subscription_id: &str)
        -> Result<Option<UserSubscription>>;

    /// Mark a subscription canceled.
    ///
    /// Returns `false` if no row exists for the id (a deletion event for a
    /// subscription this system never saw is acknowledged, not an error).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn cancel_subscription(&self, provider_subscription_id: &str) -> Result<bool>;

    // =========================================================================
    // Payment methods
    // =========================================================================

    /// Insert a payment method keyed by its provider id, if absent.
    ///
    /// Returns `false` if a method with that id already exists. Also records
    /// the customer-to-user mapping atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_payment_method(&self, method: &PaymentMethod) -> Result<bool>;

    /// Get a payment method by provider payment-method id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_payment_method(
        &self,
        provider_payment_method_id: &str,
    ) -> Result<Option<PaymentMethod>>;

    /// Delete a payment method by provider id.
    ///
    /// Returns `false` if no row existed (idempotent delete).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_payment_method(&self, provider_payment_method_id: &str) -> Result<bool>;

    // =========================================================================
    // Customer mapping
    // =========================================================================

    /// Resolve a provider customer id to an internal user id.
    ///
    /// The mapping is populated by subscription upserts and payment-method
    /// inserts. Returns `None` when no local record references the customer,
    /// which handlers treat as a soft outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_user_by_customer(&self, provider_customer_id: &str) -> Result<Option<UserId>>;
}
