//! Webhook endpoint integration tests.
//!
//! These drive the full HTTP surface: signature verification, envelope
//! parsing, dispatch, and the reconcile handlers, asserting on the rows the
//! store ends up with. Provider API calls go to a wiremock server.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{sign_payload, TestHarness, TEST_WEBHOOK_SECRET};
use coursebill_core::{CourseId, SubscriptionStatus, UserId};
use coursebill_store::Store;

/// Build a `checkout.session.completed` event for a course purchase.
fn course_checkout_event(
    session_id: &str,
    user_id: &UserId,
    course_id: &CourseId,
    amount_cents: i64,
) -> serde_json::Value {
    json!({
        "id": format!("evt_{session_id}"),
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "data": {
            "object": {
                "id": session_id,
                "payment_status": "paid",
                "client_reference_id": user_id.to_string(),
                "amount_total": amount_cents,
                "currency": "eur",
                "customer": "cus_course",
                "payment_intent": "pi_1",
                "invoice": format!("in_{session_id}"),
                "metadata": {
                    "purchase_kind": "course_purchase",
                    "course_id": course_id.to_string()
                }
            }
        }
    })
}

/// Mount a subscription fetch mock returning the given resource.
async fn mock_subscription(mock: &MockServer, subscription_id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{subscription_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(mock)
        .await;
}

async fn post_event(harness: &TestHarness, event: &serde_json::Value) -> axum_test::TestResponse {
    harness
        .server
        .post("/webhooks/stripe")
        .text(event.to_string())
        .await
}

// ============================================================================
// Course purchases
// ============================================================================

#[tokio::test]
async fn course_purchase_creates_payment_enrollment_and_invoice() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let course_id = CourseId::generate();

    let event = course_checkout_event("cs_1", &user_id, &course_id, 4900);
    post_event(&harness, &event).await.assert_status_ok();

    let payment = harness.store.get_payment("cs_1").unwrap().unwrap();
    assert_eq!(payment.user_id, user_id);
    assert_eq!(payment.course_id, Some(course_id));
    assert_eq!(payment.amount_cents, 4900);
    assert_eq!(payment.currency, "eur");

    let enrollment = harness
        .store
        .get_enrollment(&user_id, &course_id)
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.user_id, user_id);

    let invoice = harness.store.get_invoice("in_cs_1").unwrap().unwrap();
    assert_eq!(invoice.user_id, user_id);
    assert_eq!(invoice.amount_cents, 4900);
    assert_eq!(invoice.course_id, Some(course_id));
}

#[tokio::test]
async fn course_purchase_replay_is_idempotent() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let course_id = CourseId::generate();

    let event = course_checkout_event("cs_2", &user_id, &course_id, 4900);
    post_event(&harness, &event).await.assert_status_ok();
    post_event(&harness, &event).await.assert_status_ok();

    let enrollments = harness.store.list_enrollments(&user_id).unwrap();
    assert_eq!(enrollments.len(), 1);

    // A conflicting redelivery must not overwrite the first record either.
    let conflicting = course_checkout_event("cs_2", &user_id, &course_id, 9900);
    post_event(&harness, &conflicting).await.assert_status_ok();

    let payment = harness.store.get_payment("cs_2").unwrap().unwrap();
    assert_eq!(payment.amount_cents, 4900);
}

#[tokio::test]
async fn unpaid_checkout_session_is_ignored() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let course_id = CourseId::generate();

    let mut event = course_checkout_event("cs_3", &user_id, &course_id, 4900);
    event["data"]["object"]["payment_status"] = json!("unpaid");

    post_event(&harness, &event).await.assert_status_ok();
    assert!(harness.store.get_payment("cs_3").unwrap().is_none());
    assert!(harness
        .store
        .get_enrollment(&user_id, &course_id)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn checkout_without_purchase_kind_is_acknowledged() {
    let harness = TestHarness::new();

    let event = json!({
        "id": "evt_foreign",
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "data": {
            "object": {
                "id": "cs_foreign",
                "payment_status": "paid",
                "metadata": {}
            }
        }
    });

    post_event(&harness, &event).await.assert_status_ok();
    assert!(harness.store.get_payment("cs_foreign").unwrap().is_none());
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn subscription_checkout_syncs_live_state() {
    let (harness, mock) = TestHarness::with_stripe().await;
    let user_id = UserId::generate();
    let plan_id = coursebill_core::PlanId::generate();

    mock_subscription(
        &mock,
        "sub_1",
        json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "current_period_start": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "cancel_at_period_end": false,
            "metadata": { "plan_id": plan_id.to_string() }
        }),
    )
    .await;

    let event = json!({
        "id": "evt_sub_checkout",
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "data": {
            "object": {
                "id": "cs_sub_1",
                "payment_status": "paid",
                "client_reference_id": user_id.to_string(),
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "purchase_kind": "subscription" }
            }
        }
    });

    post_event(&harness, &event).await.assert_status_ok();

    let subscription = harness.store.get_subscription("sub_1").unwrap().unwrap();
    assert_eq!(subscription.user_id, user_id);
    assert_eq!(subscription.plan_id, plan_id);
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert!(!subscription.cancel_at_period_end);

    // The checkout also establishes the customer-to-user mapping.
    let mapped = harness.store.find_user_by_customer("cus_1").unwrap();
    assert_eq!(mapped, Some(user_id));
}

#[tokio::test]
async fn subscription_update_applies_refetched_state() {
    let (harness, mock) = TestHarness::with_stripe().await;
    let user_id = harness.seed_customer("cus_2", "sub_2");

    mock_subscription(
        &mock,
        "sub_2",
        json!({
            "id": "sub_2",
            "customer": "cus_2",
            "status": "past_due",
            "current_period_start": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "cancel_at_period_end": true,
            "metadata": {}
        }),
    )
    .await;

    // The event payload claims "active"; the refetched state wins.
    let event = json!({
        "id": "evt_sub_updated",
        "type": "customer.subscription.updated",
        "created": 1_700_000_100,
        "data": {
            "object": { "id": "sub_2", "customer": "cus_2", "status": "active" }
        }
    });

    post_event(&harness, &event).await.assert_status_ok();

    let subscription = harness.store.get_subscription("sub_2").unwrap().unwrap();
    assert_eq!(subscription.user_id, user_id);
    assert_eq!(subscription.status, SubscriptionStatus::PastDue);
    assert!(subscription.cancel_at_period_end);
}

#[tokio::test]
async fn canceled_subscription_stays_canceled_after_stale_update() {
    let (harness, mock) = TestHarness::with_stripe().await;
    harness.seed_customer("cus_3", "sub_3");

    let deleted = json!({
        "id": "evt_sub_deleted",
        "type": "customer.subscription.deleted",
        "created": 1_700_000_200,
        "data": { "object": { "id": "sub_3", "customer": "cus_3" } }
    });
    post_event(&harness, &deleted).await.assert_status_ok();

    let subscription = harness.store.get_subscription("sub_3").unwrap().unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Canceled);

    // A late-arriving update refetches; the provider reports canceled.
    mock_subscription(
        &mock,
        "sub_3",
        json!({
            "id": "sub_3",
            "customer": "cus_3",
            "status": "canceled",
            "current_period_start": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "cancel_at_period_end": false,
            "metadata": {}
        }),
    )
    .await;

    let stale_update = json!({
        "id": "evt_sub_stale",
        "type": "customer.subscription.updated",
        "created": 1_699_999_000,
        "data": {
            "object": { "id": "sub_3", "customer": "cus_3", "status": "active" }
        }
    });
    post_event(&harness, &stale_update).await.assert_status_ok();

    let subscription = harness.store.get_subscription("sub_3").unwrap().unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Canceled);
}

#[tokio::test]
async fn update_for_subscription_gone_at_provider_cancels_locally() {
    let (harness, mock) = TestHarness::with_stripe().await;
    harness.seed_customer("cus_4", "sub_4");

    Mock::given(method("GET"))
        .and(path("/subscriptions/sub_4"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "type": "invalid_request_error", "message": "No such subscription" }
        })))
        .mount(&mock)
        .await;

    let event = json!({
        "id": "evt_sub_gone",
        "type": "customer.subscription.updated",
        "created": 1_700_000_300,
        "data": {
            "object": { "id": "sub_4", "customer": "cus_4", "status": "active" }
        }
    });
    post_event(&harness, &event).await.assert_status_ok();

    let subscription = harness.store.get_subscription("sub_4").unwrap().unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Canceled);
}

#[tokio::test]
async fn provider_api_failure_returns_retryable_error() {
    let (harness, mock) = TestHarness::with_stripe().await;
    harness.seed_customer("cus_9", "sub_9");

    Mock::given(method("GET"))
        .and(path("/subscriptions/sub_9"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "type": "api_error", "message": "Internal server error" }
        })))
        .mount(&mock)
        .await;

    let event = json!({
        "id": "evt_sub_api_down",
        "type": "customer.subscription.updated",
        "created": 1_700_000_350,
        "data": {
            "object": { "id": "sub_9", "customer": "cus_9", "status": "active" }
        }
    });

    // 502 asks the provider to redeliver once the API recovers.
    let response = post_event(&harness, &event).await;
    response.assert_status(StatusCode::BAD_GATEWAY);

    // Nothing was written; the redelivery replays against the same row.
    let subscription = harness.store.get_subscription("sub_9").unwrap().unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn unknown_provider_status_is_acknowledged_without_write() {
    let (harness, mock) = TestHarness::with_stripe().await;
    harness.seed_customer("cus_10", "sub_10");

    mock_subscription(
        &mock,
        "sub_10",
        json!({
            "id": "sub_10",
            "customer": "cus_10",
            "status": "hibernating",
            "current_period_start": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "cancel_at_period_end": true,
            "metadata": {}
        }),
    )
    .await;

    let event = json!({
        "id": "evt_sub_new_status",
        "type": "customer.subscription.updated",
        "created": 1_700_000_360,
        "data": {
            "object": { "id": "sub_10", "customer": "cus_10", "status": "hibernating" }
        }
    });
    post_event(&harness, &event).await.assert_status_ok();

    // The row keeps its previous state until a status this version knows.
    let subscription = harness.store.get_subscription("sub_10").unwrap().unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert!(!subscription.cancel_at_period_end);
}

#[tokio::test]
async fn deletion_for_unknown_subscription_is_acknowledged() {
    let harness = TestHarness::new();

    let event = json!({
        "id": "evt_unknown_sub",
        "type": "customer.subscription.deleted",
        "created": 1_700_000_400,
        "data": { "object": { "id": "sub_never_seen" } }
    });

    post_event(&harness, &event).await.assert_status_ok();
    assert!(harness
        .store
        .get_subscription("sub_never_seen")
        .unwrap()
        .is_none());
}

// ============================================================================
// Invoices
// ============================================================================

#[tokio::test]
async fn invoice_paid_records_invoice_for_known_customer() {
    let harness = TestHarness::new();
    let user_id = harness.seed_customer("cus_5", "sub_5");

    let event = json!({
        "id": "evt_invoice",
        "type": "invoice.paid",
        "created": 1_700_000_500,
        "data": {
            "object": { "id": "in_42", "customer": "cus_5", "amount_paid": 999, "currency": "eur" }
        }
    });
    post_event(&harness, &event).await.assert_status_ok();

    let invoice = harness.store.get_invoice("in_42").unwrap().unwrap();
    assert_eq!(invoice.user_id, user_id);
    assert_eq!(invoice.amount_cents, 999);

    // A conflicting redelivery keeps the first record.
    let mut conflicting = event;
    conflicting["data"]["object"]["amount_paid"] = json!(5);
    post_event(&harness, &conflicting).await.assert_status_ok();

    let invoice = harness.store.get_invoice("in_42").unwrap().unwrap();
    assert_eq!(invoice.amount_cents, 999);
}

#[tokio::test]
async fn invoice_paid_for_unknown_customer_is_acknowledged() {
    let harness = TestHarness::new();

    let event = json!({
        "id": "evt_invoice_orphan",
        "type": "invoice.paid",
        "created": 1_700_000_600,
        "data": {
            "object": { "id": "in_orphan", "customer": "cus_never_seen", "amount_paid": 999 }
        }
    });

    post_event(&harness, &event).await.assert_status_ok();
    assert!(harness.store.get_invoice("in_orphan").unwrap().is_none());
}

#[tokio::test]
async fn invoice_paid_advances_subscription_period() {
    let (harness, mock) = TestHarness::with_stripe().await;
    let user_id = harness.seed_customer("cus_6", "sub_6");

    mock_subscription(
        &mock,
        "sub_6",
        json!({
            "id": "sub_6",
            "customer": "cus_6",
            "status": "active",
            "current_period_start": 1_704_067_200,
            "current_period_end": 1_706_745_600,
            "cancel_at_period_end": false,
            "metadata": {}
        }),
    )
    .await;

    let event = json!({
        "id": "evt_renewal",
        "type": "invoice.paid",
        "created": 1_704_067_200,
        "data": {
            "object": {
                "id": "in_renewal",
                "customer": "cus_6",
                "subscription": "sub_6",
                "amount_paid": 1900,
                "currency": "usd"
            }
        }
    });
    post_event(&harness, &event).await.assert_status_ok();

    let invoice = harness.store.get_invoice("in_renewal").unwrap().unwrap();
    assert_eq!(invoice.subscription_id.as_deref(), Some("sub_6"));
    assert_eq!(invoice.user_id, user_id);

    let subscription = harness.store.get_subscription("sub_6").unwrap().unwrap();
    assert_eq!(subscription.current_period_start.timestamp(), 1_704_067_200);
    assert_eq!(subscription.current_period_end.timestamp(), 1_706_745_600);
}

// ============================================================================
// Payment methods
// ============================================================================

#[tokio::test]
async fn payment_method_attached_records_card() {
    let harness = TestHarness::new();
    let user_id = harness.seed_customer("cus_7", "sub_7");

    let event = json!({
        "id": "evt_pm_attached",
        "type": "payment_method.attached",
        "created": 1_700_000_700,
        "data": {
            "object": {
                "id": "pm_1",
                "customer": "cus_7",
                "card": { "brand": "visa", "last4": "4242", "exp_month": 12, "exp_year": 2030 }
            }
        }
    });
    post_event(&harness, &event).await.assert_status_ok();

    let pm = harness.store.get_payment_method("pm_1").unwrap().unwrap();
    assert_eq!(pm.user_id, user_id);
    assert_eq!(pm.brand.as_deref(), Some("visa"));
    assert_eq!(pm.last4.as_deref(), Some("4242"));
    assert!(!pm.is_default);
}

#[tokio::test]
async fn payment_method_attached_for_unknown_customer_is_acknowledged() {
    let harness = TestHarness::new();

    let event = json!({
        "id": "evt_pm_orphan",
        "type": "payment_method.attached",
        "created": 1_700_000_800,
        "data": { "object": { "id": "pm_orphan", "customer": "cus_never_seen" } }
    });

    post_event(&harness, &event).await.assert_status_ok();
    assert!(harness
        .store
        .get_payment_method("pm_orphan")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn payment_method_detached_removes_row() {
    let harness = TestHarness::new();
    harness.seed_customer("cus_8", "sub_8");

    let attached = json!({
        "id": "evt_pm_attach",
        "type": "payment_method.attached",
        "created": 1_700_000_900,
        "data": { "object": { "id": "pm_2", "customer": "cus_8" } }
    });
    post_event(&harness, &attached).await.assert_status_ok();
    assert!(harness.store.get_payment_method("pm_2").unwrap().is_some());

    let detached = json!({
        "id": "evt_pm_detach",
        "type": "payment_method.detached",
        "created": 1_700_001_000,
        "data": { "object": { "id": "pm_2" } }
    });
    post_event(&harness, &detached).await.assert_status_ok();
    assert!(harness.store.get_payment_method("pm_2").unwrap().is_none());

    // Detaching again is a no-op, not an error.
    post_event(&harness, &detached).await.assert_status_ok();
}

// ============================================================================
// Envelope handling
// ============================================================================

#[tokio::test]
async fn unknown_event_type_is_acknowledged() {
    let harness = TestHarness::new();

    let event = json!({
        "id": "evt_exotic",
        "type": "charge.refunded",
        "created": 1_700_001_100,
        "data": { "object": { "id": "ch_1" } }
    });

    let response = post_event(&harness, &event).await;
    response.assert_status_ok();
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/webhooks/stripe")
        .text("not json at all")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Signature verification
// ============================================================================

#[tokio::test]
async fn valid_signature_is_accepted() {
    let harness = TestHarness::with_webhook_secret();

    let body = json!({
        "id": "evt_signed",
        "type": "charge.refunded",
        "created": 1_700_001_200,
        "data": { "object": {} }
    })
    .to_string();
    let header = sign_payload(&body, TEST_WEBHOOK_SECRET, chrono::Utc::now().timestamp());

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", header)
        .text(body)
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn invalid_signature_is_rejected() {
    let harness = TestHarness::with_webhook_secret();

    let body = json!({
        "id": "evt_forged",
        "type": "charge.refunded",
        "created": 1_700_001_300,
        "data": { "object": {} }
    })
    .to_string();
    let header = sign_payload(&body, "whsec_wrong_secret", chrono::Utc::now().timestamp());

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", header)
        .text(body)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let harness = TestHarness::with_webhook_secret();

    let response = harness
        .server
        .post("/webhooks/stripe")
        .text("{}")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_signature_is_rejected() {
    let harness = TestHarness::with_webhook_secret();

    let body = json!({
        "id": "evt_replayed",
        "type": "charge.refunded",
        "created": 1_700_001_400,
        "data": { "object": {} }
    })
    .to_string();
    let header = sign_payload(
        &body,
        TEST_WEBHOOK_SECRET,
        chrono::Utc::now().timestamp() - 3600,
    );

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", header)
        .text(body)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}
