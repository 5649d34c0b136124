//! Domain models shared across the api, store, and settlement layers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::settlement::PaymentState;
use crate::util::now_millis;

/// An event listing plus its ticket ledger.
///
/// `sold_tickets` is the authoritative sale counter: it only grows, and only
/// through the settlement path. `is_sold_out` is derived (`sold >= total`)
/// and cached for cheap reads.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub venue: String,
    /// Unix millis
    pub starts_at: i64,
    pub ends_at: i64,
    /// Unit ticket price in cents; the attempt amount is fixed at creation
    pub price_cents: i64,
    /// Capacity, immutable after creation
    pub total_tickets: i32,
    pub sold_tickets: i32,
    pub is_sold_out: bool,
    pub is_active: bool,
    pub image_url: Option<String>,
    pub created_at: i64,
}

impl Event {
    pub fn remaining(&self) -> i32 {
        self.total_tickets - self.sold_tickets
    }

    /// Build a fresh ledger entry from a creation request.
    pub fn create(new: &NewEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: new.title.clone(),
            description: new.description.clone(),
            category: new.category.clone(),
            venue: new.venue.clone(),
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            price_cents: new.price_cents,
            total_tickets: new.total_tickets,
            sold_tickets: 0,
            is_sold_out: false,
            is_active: true,
            image_url: new.image_url.clone(),
            created_at: now_millis(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub venue: String,
    pub starts_at: i64,
    pub ends_at: i64,
    pub price_cents: i64,
    pub total_tickets: i32,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Partial update for an event. Capacity and the sold counter are not
/// patchable; the counter belongs to the settlement path alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub venue: Option<String>,
    pub starts_at: Option<i64>,
    pub ends_at: Option<i64>,
    pub price_cents: Option<i64>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct EventFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

/// A single checkout's record, from intent creation to terminal outcome.
/// Append-only: rows transition state but are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentAttempt {
    pub id: Uuid,
    /// Opaque identifier from the external auth collaborator
    pub buyer_id: String,
    pub event_id: Uuid,
    pub quantity: i32,
    /// price_cents x quantity, fixed at creation and never recomputed
    pub amount_cents: i64,
    pub currency: String,
    /// Gateway intent id; unique, the idempotency key for reconciliation
    pub gateway_reference: String,
    #[sqlx(try_from = "String")]
    pub state: PaymentState,
    pub failure_reason: Option<String>,
    pub created_at: i64,
    /// Last state transition
    pub updated_at: i64,
}

impl PaymentAttempt {
    /// Build a fresh PENDING attempt.
    pub fn create(new: &NewAttempt) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4(),
            buyer_id: new.buyer_id.clone(),
            event_id: new.event_id,
            quantity: new.quantity,
            amount_cents: new.amount_cents,
            currency: new.currency.clone(),
            gateway_reference: new.gateway_reference.clone(),
            state: PaymentState::Pending,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub buyer_id: String,
    pub event_id: Uuid,
    pub quantity: i32,
    pub amount_cents: i64,
    pub currency: String,
    pub gateway_reference: String,
}

/// Advisory availability snapshot. A subsequent reserve may still race past
/// this read; only the commit-time conditional update is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub remaining: i32,
    pub sold_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStats {
    pub total_revenue_cents: i64,
    pub tickets_sold: i64,
    pub remaining_tickets: i32,
    pub completed_payments: i64,
}
