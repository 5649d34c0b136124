//! Checkout endpoints: create-intent, confirm, status, history

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, ErrorCode};
use crate::model::PaymentAttempt;
use crate::settlement::CreatedAttempt;
use crate::state::AppState;
use crate::store::SettleOutcome;

use super::ApiResult;

/// POST /api/payments/create-intent
#[derive(Deserialize)]
pub struct CreateIntentRequest {
    pub buyer_id: String,
    pub event_id: Uuid,
    pub quantity: i32,
}

pub async fn create_intent(
    State(state): State<AppState>,
    Json(req): Json<CreateIntentRequest>,
) -> ApiResult<CreatedAttempt> {
    if req.buyer_id.trim().is_empty() {
        return Err(AppError::validation("buyer_id must not be empty").into());
    }
    let created = state
        .settlement
        .create_attempt(&req.buyer_id, req.event_id, req.quantity)
        .await?;
    Ok(Json(created))
}

/// POST /api/payments/confirm
///
/// Synchronous confirmation path: the client presents the gateway reference
/// directly instead of waiting for the webhook.
#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub gateway_reference: String,
}

pub async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<serde_json::Value> {
    match state.settlement.confirm(&req.gateway_reference).await? {
        SettleOutcome::Completed(_) | SettleOutcome::AlreadyCompleted(_) => {
            Ok(Json(serde_json::json!({
                "status": "completed",
                "conflict": false,
            })))
        }
        // The attempt is durably FAILED; this is the expected outcome of a
        // lost capacity race, not a transient error to retry.
        SettleOutcome::CapacityExceeded(_) => {
            Err(AppError::new(ErrorCode::CapacityExceeded).into())
        }
        SettleOutcome::Conflict(_) => Ok(Json(serde_json::json!({
            "status": "failed",
            "conflict": true,
        }))),
        SettleOutcome::NotFound => Err(AppError::new(ErrorCode::PaymentNotFound).into()),
    }
}

/// GET /api/payments/{id}?buyer_id=...
#[derive(Deserialize)]
pub struct BuyerQuery {
    pub buyer_id: String,
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<BuyerQuery>,
) -> ApiResult<PaymentAttempt> {
    // Buyers can only see their own payments
    let attempt = state
        .store
        .attempt(id)
        .await?
        .filter(|a| a.buyer_id == query.buyer_id)
        .ok_or_else(|| AppError::new(ErrorCode::PaymentNotFound))?;
    Ok(Json(attempt))
}

/// GET /api/payments?buyer_id=...&limit=...&offset=...
#[derive(Deserialize)]
pub struct HistoryQuery {
    pub buyer_id: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    10
}

pub async fn list_for_buyer(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<PaymentAttempt>> {
    let attempts = state
        .store
        .attempts_for_buyer(
            &query.buyer_id,
            query.limit.clamp(1, 100),
            query.offset.max(0),
        )
        .await?;
    Ok(Json(attempts))
}
