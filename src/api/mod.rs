//! API routes for boxoffice

pub mod events;
pub mod health;
pub mod payments;
pub mod webhook;

use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ServiceError;
use crate::state::AppState;

pub type ApiResult<T> = Result<Json<T>, ServiceError>;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Event catalog, availability, and stats
    let events = Router::new()
        .route("/api/events", post(events::create).get(events::list))
        .route(
            "/api/events/{id}",
            get(events::get_by_id)
                .put(events::update)
                .delete(events::delete),
        )
        .route("/api/events/{id}/availability", get(events::availability))
        .route("/api/events/{id}/stats", get(events::stats));

    // Checkout and payment status
    let payments = Router::new()
        .route("/api/payments/create-intent", post(payments::create_intent))
        .route("/api/payments/confirm", post(payments::confirm))
        .route("/api/payments", get(payments::list_for_buyer))
        .route("/api/payments/{id}", get(payments::get_by_id));

    // Gateway webhook (signature-verified, raw body)
    let webhook = Router::new().route("/api/payments/webhook", post(webhook::handle_webhook));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(events)
        .merge(payments)
        .merge(webhook)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
