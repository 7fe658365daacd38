//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Payments, keyed by provider checkout-session id.
    pub const PAYMENTS: &str = "payments";

    /// Enrollments, keyed by `user_id || course_id` (16 + 16 bytes).
    pub const ENROLLMENTS: &str = "enrollments";

    /// Invoices, keyed by provider invoice id.
    pub const INVOICES: &str = "invoices";

    /// Subscriptions, keyed by provider subscription id.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Payment methods, keyed by provider payment-method id.
    pub const PAYMENT_METHODS: &str = "payment_methods";

    /// Reverse index: provider customer id to internal user id.
    pub const CUSTOMER_USERS: &str = "customer_users";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::PAYMENTS,
        cf::ENROLLMENTS,
        cf::INVOICES,
        cf::SUBSCRIPTIONS,
        cf::PAYMENT_METHODS,
        cf::CUSTOMER_USERS,
    ]
}
