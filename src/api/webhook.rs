//! Gateway webhook handler
//!
//! POST /api/payments/webhook — handles Stripe events (raw body for
//! signature verification).
//!
//! The gateway retries deliveries and may reorder them; everything here is
//! safe to replay. 200 means accepted or deliberately ignored, 400 means the
//! request never authenticated (bad signature) or never parsed, with zero
//! state change either way.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::error::ServiceError;
use crate::gateway::stripe;
use crate::state::AppState;

/// Handle incoming gateway webhook events
///
/// Must receive the raw body (not parsed JSON) for HMAC verification.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let sig_header = match headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    {
        Some(s) => s,
        None => {
            tracing::warn!("missing Stripe-Signature header");
            return StatusCode::BAD_REQUEST;
        }
    };

    if let Err(e) = stripe::verify_webhook_signature(&body, sig_header, &state.stripe_webhook_secret)
    {
        tracing::warn!(error = e, "webhook signature verification failed");
        return StatusCode::BAD_REQUEST;
    }

    let event: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "failed to parse webhook JSON");
            return StatusCode::BAD_REQUEST;
        }
    };

    let Some(event_type) = event["type"].as_str() else {
        tracing::warn!("webhook event missing type");
        return StatusCode::BAD_REQUEST;
    };
    tracing::info!(event_type, "received gateway webhook");

    match event_type {
        "payment_intent.succeeded" => handle_intent_succeeded(&state, &event).await,
        "payment_intent.payment_failed" => handle_intent_failed(&state, &event).await,
        _ => {
            tracing::debug!(event_type, "unhandled webhook event type");
            StatusCode::OK
        }
    }
}

fn intent_reference(event: &serde_json::Value) -> Option<&str> {
    event
        .get("data")
        .and_then(|d| d.get("object"))
        .and_then(|o| o["id"].as_str())
}

/// payment_intent.succeeded → commit the attempt (idempotent)
async fn handle_intent_succeeded(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let Some(reference) = intent_reference(event) else {
        tracing::warn!("payment_intent.succeeded missing intent id");
        return StatusCode::BAD_REQUEST;
    };

    match state.settlement.commit(reference).await {
        // Every settle outcome is final from the gateway's point of view:
        // retrying a capacity loss or a conflict cannot change it.
        Ok(_) => StatusCode::OK,
        Err(ServiceError::App(e)) => {
            tracing::warn!(code = %e.code, reference, "webhook commit rejected");
            StatusCode::OK
        }
        Err(ServiceError::Db(e)) => {
            tracing::error!(%e, "database error during webhook commit");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// payment_intent.payment_failed → fail the attempt (idempotent)
async fn handle_intent_failed(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let Some(reference) = intent_reference(event) else {
        tracing::warn!("payment_intent.payment_failed missing intent id");
        return StatusCode::BAD_REQUEST;
    };

    let reason = event
        .get("data")
        .and_then(|d| d.get("object"))
        .and_then(|o| o.get("last_payment_error"))
        .and_then(|e| e["message"].as_str())
        .unwrap_or("gateway reported failure");

    match state.settlement.fail(reference, reason).await {
        Ok(_) => StatusCode::OK,
        Err(ServiceError::App(e)) => {
            tracing::warn!(code = %e.code, reference, "webhook fail rejected");
            StatusCode::OK
        }
        Err(ServiceError::Db(e)) => {
            tracing::error!(%e, "database error during webhook fail");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
