//! In-memory store for tests and offline development
//!
//! A single mutex around the maps is the process-local equivalent of the
//! row-level serialization the Postgres store gets from the database: every
//! settle/fail runs the same transition-table checks while holding it, so
//! the concurrency properties under test match production.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{DeleteOutcome, FailOutcome, SettleOutcome, Store, StoreError};
use crate::model::{
    Event, EventFilter, EventPatch, EventStats, NewAttempt, NewEvent, PaymentAttempt,
};
use crate::settlement::{PaymentState, Transition};
use crate::util::now_millis;

#[derive(Default)]
struct Inner {
    events: HashMap<Uuid, Event>,
    attempts: HashMap<Uuid, PaymentAttempt>,
    by_reference: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_event(&self, new: &NewEvent) -> Result<Event, StoreError> {
        let event = Event::create(new);
        self.inner
            .lock()
            .unwrap()
            .events
            .insert(event.id, event.clone());
        Ok(event)
    }

    async fn event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.inner.lock().unwrap().events.get(&id).cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut events: Vec<Event> = inner
            .events
            .values()
            .filter(|e| {
                filter.category.as_deref().is_none_or(|c| e.category == c)
                    && filter.is_active.is_none_or(|a| e.is_active == a)
                    && filter.search.as_deref().is_none_or(|s| {
                        let needle = s.to_lowercase();
                        e.title.to_lowercase().contains(&needle)
                            || e.description.to_lowercase().contains(&needle)
                    })
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn update_event(
        &self,
        id: Uuid,
        patch: &EventPatch,
    ) -> Result<Option<Event>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(event) = inner.events.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            event.title = title.clone();
        }
        if let Some(description) = &patch.description {
            event.description = description.clone();
        }
        if let Some(category) = &patch.category {
            event.category = category.clone();
        }
        if let Some(venue) = &patch.venue {
            event.venue = venue.clone();
        }
        if let Some(starts_at) = patch.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(ends_at) = patch.ends_at {
            event.ends_at = ends_at;
        }
        if let Some(price_cents) = patch.price_cents {
            event.price_cents = price_cents;
        }
        if let Some(image_url) = &patch.image_url {
            event.image_url = Some(image_url.clone());
        }
        if let Some(is_active) = patch.is_active {
            event.is_active = is_active;
        }
        Ok(Some(event.clone()))
    }

    async fn delete_event(&self, id: Uuid) -> Result<DeleteOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.attempts.values().any(|a| a.event_id == id) {
            return Ok(DeleteOutcome::HasAttempts);
        }
        Ok(match inner.events.remove(&id) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }

    async fn event_stats(&self, id: Uuid) -> Result<Option<EventStats>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(event) = inner.events.get(&id) else {
            return Ok(None);
        };
        let completed = inner
            .attempts
            .values()
            .filter(|a| a.event_id == id && a.state == PaymentState::Completed);
        let mut stats = EventStats {
            total_revenue_cents: 0,
            tickets_sold: 0,
            remaining_tickets: event.remaining(),
            completed_payments: 0,
        };
        for attempt in completed {
            stats.total_revenue_cents += attempt.amount_cents;
            stats.tickets_sold += i64::from(attempt.quantity);
            stats.completed_payments += 1;
        }
        Ok(Some(stats))
    }

    async fn create_attempt(&self, new: &NewAttempt) -> Result<PaymentAttempt, StoreError> {
        let attempt = PaymentAttempt::create(new);
        let mut inner = self.inner.lock().unwrap();
        if inner.by_reference.contains_key(&new.gateway_reference) {
            return Err(StoreError::DuplicateReference(new.gateway_reference.clone()));
        }
        inner
            .by_reference
            .insert(new.gateway_reference.clone(), attempt.id);
        inner.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn attempt(&self, id: Uuid) -> Result<Option<PaymentAttempt>, StoreError> {
        Ok(self.inner.lock().unwrap().attempts.get(&id).cloned())
    }

    async fn attempt_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentAttempt>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .by_reference
            .get(reference)
            .and_then(|id| inner.attempts.get(id))
            .cloned())
    }

    async fn attempts_for_buyer(
        &self,
        buyer_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentAttempt>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut attempts: Vec<PaymentAttempt> = inner
            .attempts
            .values()
            .filter(|a| a.buyer_id == buyer_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| std::cmp::Reverse(a.created_at));
        Ok(attempts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn settle_attempt(&self, reference: &str) -> Result<SettleOutcome, StoreError> {
        let mut guard = self.inner.lock().unwrap();
        let Inner {
            events,
            attempts,
            by_reference,
        } = &mut *guard;

        let Some(attempt) = by_reference.get(reference).and_then(|id| attempts.get_mut(id))
        else {
            return Ok(SettleOutcome::NotFound);
        };

        match attempt.state.transition(PaymentState::Completed) {
            Transition::NoOp => Ok(SettleOutcome::AlreadyCompleted(attempt.clone())),
            Transition::Conflict => Ok(SettleOutcome::Conflict(attempt.clone())),
            Transition::Applied(_) => {
                let event = events
                    .get_mut(&attempt.event_id)
                    .ok_or(StoreError::EventMissing(attempt.event_id))?;
                let now = now_millis();
                if event.sold_tickets + attempt.quantity <= event.total_tickets {
                    event.sold_tickets += attempt.quantity;
                    event.is_sold_out = event.sold_tickets >= event.total_tickets;
                    attempt.state = PaymentState::Completed;
                    attempt.updated_at = now;
                    Ok(SettleOutcome::Completed(attempt.clone()))
                } else {
                    attempt.state = PaymentState::Failed;
                    attempt.failure_reason = Some("capacity exceeded".to_string());
                    attempt.updated_at = now;
                    Ok(SettleOutcome::CapacityExceeded(attempt.clone()))
                }
            }
        }
    }

    async fn fail_attempt(
        &self,
        reference: &str,
        reason: &str,
    ) -> Result<FailOutcome, StoreError> {
        let mut guard = self.inner.lock().unwrap();
        let Inner {
            attempts,
            by_reference,
            ..
        } = &mut *guard;

        let Some(attempt) = by_reference.get(reference).and_then(|id| attempts.get_mut(id))
        else {
            return Ok(FailOutcome::NotFound);
        };

        match attempt.state.transition(PaymentState::Failed) {
            Transition::NoOp => Ok(FailOutcome::AlreadyFailed(attempt.clone())),
            Transition::Conflict => Ok(FailOutcome::Conflict(attempt.clone())),
            Transition::Applied(_) => {
                attempt.state = PaymentState::Failed;
                attempt.failure_reason = Some(reason.to_string());
                attempt.updated_at = now_millis();
                Ok(FailOutcome::Failed(attempt.clone()))
            }
        }
    }

    async fn expire_pending_before(
        &self,
        cutoff_ms: i64,
        reason: &str,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let now = now_millis();
        let mut expired = 0;
        for attempt in inner.attempts.values_mut() {
            if attempt.state == PaymentState::Pending && attempt.created_at < cutoff_ms {
                attempt.state = PaymentState::Failed;
                attempt.failure_reason = Some(reason.to_string());
                attempt.updated_at = now;
                expired += 1;
            }
        }
        Ok(expired)
    }
}
