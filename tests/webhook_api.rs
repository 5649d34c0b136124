//! Full-router tests: checkout over HTTP and webhook reconciliation with
//! real HMAC signatures (duplicate delivery, out-of-order delivery, and
//! bad-signature rejection).

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use sha2::Sha256;
use tower::ServiceExt;
use uuid::Uuid;

use boxoffice::api;
use boxoffice::gateway::MockGateway;
use boxoffice::state::AppState;
use boxoffice::store::MemoryStore;

const WEBHOOK_SECRET: &str = "whsec_test123secret456";

struct TestApp {
    router: Router,
    gateway: Arc<MockGateway>,
}

fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockGateway::new());
    let state = AppState::with_parts(store, gateway.clone(), "usd", WEBHOOK_SECRET);
    TestApp {
        router: api::create_router(state),
        gateway,
    }
}

fn sign(body: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let signed_payload = format!("{timestamp}.{body}");
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(signed_payload.as_bytes());
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

async fn request_json(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn post_webhook(router: &Router, body: &str, signature: Option<&str>) -> StatusCode {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(sig) = signature {
        builder = builder.header("stripe-signature", sig);
    }
    router
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
        .status()
}

async fn seed_event(app: &TestApp, capacity: i32, price_cents: i64) -> Uuid {
    let (status, body) = request_json(
        &app.router,
        "POST",
        "/api/events",
        Some(serde_json::json!({
            "title": "Midnight Premiere",
            "category": "film",
            "venue": "Screen 1",
            "starts_at": 2_000_000_000_000u64,
            "ends_at": 2_000_007_200_000u64,
            "price_cents": price_cents,
            "total_tickets": capacity,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

/// Open an attempt over HTTP; returns (attempt id, gateway reference).
async fn open_attempt(app: &TestApp, event_id: Uuid, quantity: i32) -> (Uuid, String) {
    let (status, body) = request_json(
        &app.router,
        "POST",
        "/api/payments/create-intent",
        Some(serde_json::json!({
            "buyer_id": "buyer-1",
            "event_id": event_id,
            "quantity": quantity,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let attempt_id = Uuid::parse_str(body["attempt_id"].as_str().unwrap()).unwrap();

    let (status, attempt) = request_json(
        &app.router,
        "GET",
        &format!("/api/payments/{attempt_id}?buyer_id=buyer-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reference = attempt["gateway_reference"].as_str().unwrap().to_string();
    (attempt_id, reference)
}

fn intent_event(event_type: &str, reference: &str) -> String {
    serde_json::json!({
        "id": "evt_1",
        "type": event_type,
        "data": { "object": { "id": reference, "status": "succeeded", "metadata": {} } }
    })
    .to_string()
}

async fn remaining(app: &TestApp, event_id: Uuid) -> i64 {
    let (status, body) = request_json(
        &app.router,
        "GET",
        &format!("/api/events/{event_id}/availability"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["remaining"].as_i64().unwrap()
}

async fn attempt_state(app: &TestApp, attempt_id: Uuid) -> String {
    let (status, body) = request_json(
        &app.router,
        "GET",
        &format!("/api/payments/{attempt_id}?buyer_id=buyer-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["state"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_webhook_commits_once_for_duplicate_delivery() {
    let app = test_app();
    let event_id = seed_event(&app, 3, 2_500).await;
    let (attempt_id, reference) = open_attempt(&app, event_id, 2).await;

    let body = intent_event("payment_intent.succeeded", &reference);
    let signature = sign(&body);

    // First delivery reserves the tickets
    assert_eq!(
        post_webhook(&app.router, &body, Some(&signature)).await,
        StatusCode::OK
    );
    assert_eq!(remaining(&app, event_id).await, 1);
    assert_eq!(attempt_state(&app, attempt_id).await, "completed");

    // The gateway retries with the identical payload; no further increment
    assert_eq!(
        post_webhook(&app.router, &body, Some(&signature)).await,
        StatusCode::OK
    );
    assert_eq!(remaining(&app, event_id).await, 1);
}

#[tokio::test]
async fn test_webhook_bad_signature_then_corrected() {
    let app = test_app();
    let event_id = seed_event(&app, 1, 2_500).await;
    let (attempt_id, reference) = open_attempt(&app, event_id, 1).await;

    let body = intent_event("payment_intent.succeeded", &reference);

    // Signature computed with the wrong secret: rejected, zero state change
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(b"wrong_secret").unwrap();
    mac.update(format!("{timestamp}.{body}").as_bytes());
    let forged = format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    );
    assert_eq!(
        post_webhook(&app.router, &body, Some(&forged)).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(remaining(&app, event_id).await, 1);
    assert_eq!(attempt_state(&app, attempt_id).await, "pending");

    // Same payload with a valid signature settles normally
    let signature = sign(&body);
    assert_eq!(
        post_webhook(&app.router, &body, Some(&signature)).await,
        StatusCode::OK
    );
    assert_eq!(remaining(&app, event_id).await, 0);
    assert_eq!(attempt_state(&app, attempt_id).await, "completed");
}

#[tokio::test]
async fn test_webhook_failure_cannot_be_resurrected() {
    let app = test_app();
    let event_id = seed_event(&app, 5, 2_500).await;
    let (attempt_id, reference) = open_attempt(&app, event_id, 1).await;

    let failed = intent_event("payment_intent.payment_failed", &reference);
    assert_eq!(
        post_webhook(&app.router, &failed, Some(&sign(&failed))).await,
        StatusCode::OK
    );
    assert_eq!(attempt_state(&app, attempt_id).await, "failed");

    // A success notification arriving after the failure is a conflict no-op
    let succeeded = intent_event("payment_intent.succeeded", &reference);
    assert_eq!(
        post_webhook(&app.router, &succeeded, Some(&sign(&succeeded))).await,
        StatusCode::OK
    );
    assert_eq!(attempt_state(&app, attempt_id).await, "failed");
    assert_eq!(remaining(&app, event_id).await, 5);
}

#[tokio::test]
async fn test_webhook_out_of_order_failure_after_success() {
    let app = test_app();
    let event_id = seed_event(&app, 5, 2_500).await;
    let (attempt_id, reference) = open_attempt(&app, event_id, 2).await;

    let succeeded = intent_event("payment_intent.succeeded", &reference);
    assert_eq!(
        post_webhook(&app.router, &succeeded, Some(&sign(&succeeded))).await,
        StatusCode::OK
    );

    // A stale "failed" delivery must not regress the completed record
    let failed = intent_event("payment_intent.payment_failed", &reference);
    assert_eq!(
        post_webhook(&app.router, &failed, Some(&sign(&failed))).await,
        StatusCode::OK
    );
    assert_eq!(attempt_state(&app, attempt_id).await, "completed");
    assert_eq!(remaining(&app, event_id).await, 3);
}

#[tokio::test]
async fn test_webhook_ignores_unrecognized_event_types() {
    let app = test_app();
    let event_id = seed_event(&app, 5, 2_500).await;
    let (attempt_id, reference) = open_attempt(&app, event_id, 1).await;

    let body = intent_event("charge.refunded", &reference);
    assert_eq!(
        post_webhook(&app.router, &body, Some(&sign(&body))).await,
        StatusCode::OK
    );
    assert_eq!(attempt_state(&app, attempt_id).await, "pending");
    assert_eq!(remaining(&app, event_id).await, 5);
}

#[tokio::test]
async fn test_webhook_rejects_missing_signature_and_garbage() {
    let app = test_app();

    let body = intent_event("payment_intent.succeeded", "pi_whatever");
    assert_eq!(
        post_webhook(&app.router, &body, None).await,
        StatusCode::BAD_REQUEST
    );

    // Correctly signed but not JSON
    let garbage = "not json";
    assert_eq!(
        post_webhook(&app.router, garbage, Some(&sign(garbage))).await,
        StatusCode::BAD_REQUEST
    );

    // Correctly signed but missing the event type
    let untyped = r#"{"id":"evt_1"}"#;
    assert_eq!(
        post_webhook(&app.router, untyped, Some(&sign(untyped))).await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_webhook_unknown_reference_is_acknowledged() {
    let app = test_app();
    let body = intent_event("payment_intent.succeeded", "pi_never_created");
    assert_eq!(
        post_webhook(&app.router, &body, Some(&sign(&body))).await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_confirm_endpoint_synchronous_path() {
    let app = test_app();
    let event_id = seed_event(&app, 4, 2_500).await;
    let (_, reference) = open_attempt(&app, event_id, 2).await;

    // Gateway still reports the intent as unpaid
    let (status, body) = request_json(
        &app.router,
        "POST",
        "/api/payments/confirm",
        Some(serde_json::json!({ "gateway_reference": reference })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"].as_u64().unwrap(), 5003);
    assert_eq!(remaining(&app, event_id).await, 4);

    // Once the buyer pays, confirm commits
    app.gateway.mark_succeeded(&reference);
    let (status, body) = request_json(
        &app.router,
        "POST",
        "/api/payments/confirm",
        Some(serde_json::json!({ "gateway_reference": reference })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"].as_str().unwrap(), "completed");
    assert_eq!(remaining(&app, event_id).await, 2);
}

#[tokio::test]
async fn test_create_intent_http_validation() {
    let app = test_app();
    let event_id = seed_event(&app, 4, 2_500).await;

    let (status, body) = request_json(
        &app.router,
        "POST",
        "/api/payments/create-intent",
        Some(serde_json::json!({
            "buyer_id": "buyer-1",
            "event_id": event_id,
            "quantity": 0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"].as_u64().unwrap(), 2);

    let (status, body) = request_json(
        &app.router,
        "POST",
        "/api/payments/create-intent",
        Some(serde_json::json!({
            "buyer_id": "buyer-1",
            "event_id": Uuid::new_v4(),
            "quantity": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"].as_u64().unwrap(), 4001);
}

#[tokio::test]
async fn test_event_lifecycle_over_http() {
    let app = test_app();
    let event_id = seed_event(&app, 4, 2_500).await;

    // Deactivate the listing
    let (status, body) = request_json(
        &app.router,
        "PUT",
        &format!("/api/events/{event_id}"),
        Some(serde_json::json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], serde_json::json!(false));

    // Inactive events are advisory-unavailable
    let (status, body) = request_json(
        &app.router,
        "POST",
        "/api/payments/create-intent",
        Some(serde_json::json!({
            "buyer_id": "buyer-1",
            "event_id": event_id,
            "quantity": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"].as_u64().unwrap(), 4002);

    // No attempts yet, so deletion is allowed
    let (status, _) = request_json(
        &app.router,
        "DELETE",
        &format!("/api/events/{event_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) =
        request_json(&app.router, "GET", &format!("/api/events/{event_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_stats_after_settlement() {
    let app = test_app();
    let event_id = seed_event(&app, 10, 2_500).await;
    let (_, reference) = open_attempt(&app, event_id, 4).await;

    let body = intent_event("payment_intent.succeeded", &reference);
    assert_eq!(
        post_webhook(&app.router, &body, Some(&sign(&body))).await,
        StatusCode::OK
    );

    let (status, stats) = request_json(
        &app.router,
        "GET",
        &format!("/api/events/{event_id}/stats"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_revenue_cents"].as_i64().unwrap(), 10_000);
    assert_eq!(stats["tickets_sold"].as_i64().unwrap(), 4);
    assert_eq!(stats["remaining_tickets"].as_i64().unwrap(), 6);
    assert_eq!(stats["completed_payments"].as_i64().unwrap(), 1);
}
