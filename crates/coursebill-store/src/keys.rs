//! Key encoding utilities for `RocksDB`.
//!
//! Provider-assigned ids (checkout session, invoice, subscription, payment
//! method, customer) are used verbatim as UTF-8 bytes. Enrollment keys are
//! the concatenation of the two UUID byte arrays.

use coursebill_core::{CourseId, UserId};

/// Create a payment key from a provider checkout-session id.
#[must_use]
pub fn payment_key(checkout_session_id: &str) -> Vec<u8> {
    checkout_session_id.as_bytes().to_vec()
}

/// Create an enrollment key from a (user, course) pair.
///
/// Format: `user_id (16 bytes) || course_id (16 bytes)`. All enrollments for
/// a user share a 16-byte prefix, so listing by user is a prefix scan.
#[must_use]
pub fn enrollment_key(user_id: &UserId, course_id: &CourseId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(course_id.as_bytes());
    key
}

/// Create a prefix for iterating all enrollments of a user.
#[must_use]
pub fn enrollments_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create an invoice key from a provider invoice id.
#[must_use]
pub fn invoice_key(provider_invoice_id: &str) -> Vec<u8> {
    provider_invoice_id.as_bytes().to_vec()
}

/// Create a subscription key from a provider subscription id.
#[must_use]
pub fn subscription_key(provider_subscription_id: &str) -> Vec<u8> {
    provider_subscription_id.as_bytes().to_vec()
}

/// Create a payment-method key from a provider payment-method id.
#[must_use]
pub fn payment_method_key(provider_payment_method_id: &str) -> Vec<u8> {
    provider_payment_method_id.as_bytes().to_vec()
}

/// Create a customer-index key from a provider customer id.
#[must_use]
pub fn customer_key(provider_customer_id: &str) -> Vec<u8> {
    provider_customer_id.as_bytes().to_vec()
}
