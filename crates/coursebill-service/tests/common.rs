//! Common test utilities for coursebill integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tempfile::TempDir;
use wiremock::MockServer;

use coursebill_core::{PlanId, SubscriptionStatus, UserId, UserSubscription};
use coursebill_service::{create_router, AppState, ServiceConfig};
use coursebill_store::{RocksStore, Store};

/// Signing secret used by harnesses with signature verification enabled.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct store handle for asserting on reconciled rows.
    pub store: Arc<RocksStore>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a harness with no Stripe client and no signing secret.
    ///
    /// Signature verification is skipped, which matches local development.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Create a harness with signature verification enabled.
    pub fn with_webhook_secret() -> Self {
        Self::build(None, Some(TEST_WEBHOOK_SECRET.to_string()))
    }

    /// Create a harness whose Stripe client points at a mock server.
    pub async fn with_stripe() -> (Self, MockServer) {
        let mock = MockServer::start().await;
        let harness = Self::build(Some(mock.uri()), None);
        (harness, mock)
    }

    fn build(stripe_api_base: Option<String>, webhook_secret: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            stripe_api_key: stripe_api_base.as_ref().map(|_| "sk_test_key".into()),
            stripe_webhook_secret: webhook_secret,
            stripe_api_base: stripe_api_base
                .unwrap_or_else(|| "http://127.0.0.1:1".to_string()),
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        };

        let state = AppState::new(Arc::clone(&store), config);
        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            _temp_dir: temp_dir,
        }
    }

    /// Seed a subscription row so `customer` resolves to a known user.
    pub fn seed_customer(&self, customer: &str, subscription_id: &str) -> UserId {
        let user_id = UserId::generate();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let subscription = UserSubscription {
            user_id,
            plan_id: PlanId::generate(),
            status: SubscriptionStatus::Active,
            current_period_start: now,
            current_period_end: now + chrono::Duration::days(30),
            cancel_at_period_end: false,
            provider_subscription_id: subscription_id.to_string(),
            provider_customer_id: customer.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.store
            .upsert_subscription(&subscription)
            .expect("Failed to seed subscription");
        user_id
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a valid signature header for `payload` at the given timestamp.
pub fn sign_payload(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts any key size");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}
