//! Event catalog endpoints: CRUD, availability, stats

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, ErrorCode};
use crate::model::{Availability, Event, EventFilter, EventPatch, EventStats, NewEvent};
use crate::state::AppState;
use crate::store::DeleteOutcome;

use super::ApiResult;

/// POST /api/events
pub async fn create(
    State(state): State<AppState>,
    Json(new): Json<NewEvent>,
) -> ApiResult<Event> {
    if new.title.trim().is_empty() {
        return Err(AppError::validation("title must not be empty").into());
    }
    if new.total_tickets < 1 {
        return Err(AppError::validation("total_tickets must be positive").into());
    }
    if new.price_cents < 0 {
        return Err(AppError::validation("price_cents must not be negative").into());
    }
    if new.ends_at < new.starts_at {
        return Err(AppError::validation("ends_at must not precede starts_at").into());
    }

    let event = state.store.create_event(&new).await?;
    tracing::info!(
        event_id = %event.id,
        total_tickets = event.total_tickets,
        "event created"
    );
    Ok(Json(event))
}

/// GET /api/events
#[derive(Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    10
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Event>> {
    let filter = EventFilter {
        category: query.category,
        search: query.search,
        is_active: query.is_active,
        limit: query.limit.clamp(1, 100),
        offset: query.offset.max(0),
    };
    Ok(Json(state.store.list_events(&filter).await?))
}

/// GET /api/events/{id}
pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Event> {
    let event = state
        .store
        .event(id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::EventNotFound))?;
    Ok(Json(event))
}

/// PUT /api/events/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> ApiResult<Event> {
    if patch.price_cents.is_some_and(|p| p < 0) {
        return Err(AppError::validation("price_cents must not be negative").into());
    }
    let event = state
        .store
        .update_event(id, &patch)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::EventNotFound))?;
    Ok(Json(event))
}

/// DELETE /api/events/{id}
///
/// Refused once payment attempts reference the event; deactivate instead.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    match state.store.delete_event(id).await? {
        DeleteOutcome::Deleted => {
            tracing::info!(event_id = %id, "event deleted");
            Ok(Json(serde_json::json!({ "deleted": true })))
        }
        DeleteOutcome::NotFound => Err(AppError::new(ErrorCode::EventNotFound).into()),
        DeleteOutcome::HasAttempts => Err(AppError::new(ErrorCode::EventHasAttempts).into()),
    }
}

/// GET /api/events/{id}/availability?quantity=N
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

pub async fn availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<Availability> {
    Ok(Json(
        state.settlement.availability(id, query.quantity).await?,
    ))
}

/// GET /api/events/{id}/stats
pub async fn stats(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<EventStats> {
    let stats = state
        .store
        .event_stats(id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::EventNotFound))?;
    Ok(Json(stats))
}
