//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use coursebill_core::{
    CourseId, Enrollment, Invoice, Payment, PaymentMethod, SubscriptionStatus, UserId,
    UserSubscription,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
///
/// All mutations go through a store-level write lock: insert-if-absent and
/// the read-modify-write paths (`upsert_subscription` preserving
/// `created_at`, `cancel_subscription`) are check-then-put sequences, and
/// concurrent deliveries for the same natural key must not interleave them.
/// Reads never take the lock.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Serialize check-then-put sequences across concurrent writers.
    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Read a value from a column family by key.
    fn get_value<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Check whether a key exists in a column family.
    fn key_exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        let exists = self
            .db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        Ok(exists)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Payments
    // =========================================================================

    fn insert_payment(&self, payment: &Payment) -> Result<bool> {
        let _guard = self.write_guard();

        let key = keys::payment_key(&payment.checkout_session_id);
        if self.key_exists(cf::PAYMENTS, &key)? {
            return Ok(false);
        }

        let cf = self.cf(cf::PAYMENTS)?;
        let value = Self::serialize(payment)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    fn get_payment(&self, checkout_session_id: &str) -> Result<Option<Payment>> {
        self.get_value(cf::PAYMENTS, &keys::payment_key(checkout_session_id))
    }

    // =========================================================================
    // Enrollments
    // =========================================================================

    fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<bool> {
        let _guard = self.write_guard();

        let key = keys::enrollment_key(&enrollment.user_id, &enrollment.course_id);
        if self.key_exists(cf::ENROLLMENTS, &key)? {
            return Ok(false);
        }

        let cf = self.cf(cf::ENROLLMENTS)?;
        let value = Self::serialize(enrollment)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    fn get_enrollment(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>> {
        self.get_value(cf::ENROLLMENTS, &keys::enrollment_key(user_id, course_id))
    }

    fn list_enrollments(&self, user_id: &UserId) -> Result<Vec<Enrollment>> {
        let cf = self.cf(cf::ENROLLMENTS)?;
        let prefix = keys::enrollments_prefix(user_id);

        let mut enrollments = Vec::new();
        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            enrollments.push(Self::deserialize(&value)?);
        }

        Ok(enrollments)
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    fn insert_invoice(&self, invoice: &Invoice) -> Result<bool> {
        let _guard = self.write_guard();

        let key = keys::invoice_key(&invoice.provider_invoice_id);
        if self.key_exists(cf::INVOICES, &key)? {
            return Ok(false);
        }

        let cf = self.cf(cf::INVOICES)?;
        let value = Self::serialize(invoice)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    fn get_invoice(&self, provider_invoice_id: &str) -> Result<Option<Invoice>> {
        self.get_value(cf::INVOICES, &keys::invoice_key(provider_invoice_id))
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    fn upsert_subscription(&self, subscription: &UserSubscription) -> Result<()> {
        let _guard = self.write_guard();

        let key = keys::subscription_key(&subscription.provider_subscription_id);

        // Preserve the original creation timestamp across upserts.
        let mut row = subscription.clone();
        if let Some(existing) = self.get_subscription(&subscription.provider_subscription_id)? {
            row.created_at = existing.created_at;
        }

        let cf_subs = self.cf(cf::SUBSCRIPTIONS)?;
        let cf_customers = self.cf(cf::CUSTOMER_USERS)?;

        let value = Self::serialize(&row)?;
        let customer_key = keys::customer_key(&row.provider_customer_id);
        let customer_value = Self::serialize(&row.user_id)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_subs, &key, &value);
        batch.put_cf(&cf_customers, &customer_key, &customer_value);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<UserSubscription>> {
        self.get_value(
            cf::SUBSCRIPTIONS,
            &keys::subscription_key(provider_subscription_id),
        )
    }

    fn cancel_subscription(&self, provider_subscription_id: &str) -> Result<bool> {
        let _guard = self.write_guard();

        let Some(mut subscription) = self.get_subscription(provider_subscription_id)? else {
            return Ok(false);
        };

        subscription.status = SubscriptionStatus::Canceled;
        subscription.updated_at = chrono::Utc::now();

        let cf = self.cf(cf::SUBSCRIPTIONS)?;
        let key = keys::subscription_key(provider_subscription_id);
        let value = Self::serialize(&subscription)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    // =========================================================================
    // Payment methods
    // =========================================================================

    fn insert_payment_method(&self, method: &PaymentMethod) -> Result<bool> {
        let _guard = self.write_guard();

        let key = keys::payment_method_key(&method.provider_payment_method_id);
        if self.key_exists(cf::PAYMENT_METHODS, &key)? {
            return Ok(false);
        }

        let cf_methods = self.cf(cf::PAYMENT_METHODS)?;
        let cf_customers = self.cf(cf::CUSTOMER_USERS)?;

        let value = Self::serialize(method)?;
        let customer_key = keys::customer_key(&method.provider_customer_id);
        let customer_value = Self::serialize(&method.user_id)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_methods, &key, &value);
        batch.put_cf(&cf_customers, &customer_key, &customer_value);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    fn get_payment_method(
        &self,
        provider_payment_method_id: &str,
    ) -> Result<Option<PaymentMethod>> {
        self.get_value(
            cf::PAYMENT_METHODS,
            &keys::payment_method_key(provider_payment_method_id),
        )
    }

    fn delete_payment_method(&self, provider_payment_method_id: &str) -> Result<bool> {
        let _guard = self.write_guard();

        let key = keys::payment_method_key(provider_payment_method_id);
        if !self.key_exists(cf::PAYMENT_METHODS, &key)? {
            return Ok(false);
        }

        let cf = self.cf(cf::PAYMENT_METHODS)?;
        self.db
            .delete_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    // =========================================================================
    // Customer mapping
    // =========================================================================

    fn find_user_by_customer(&self, provider_customer_id: &str) -> Result<Option<UserId>> {
        self.get_value(cf::CUSTOMER_USERS, &keys::customer_key(provider_customer_id))
    }
}
