//! PostgreSQL-backed store
//!
//! Settlement runs as one transaction: the attempt row is locked with
//! `SELECT ... FOR UPDATE`, the ledger increment is a single conditional
//! UPDATE, and the state transition commits with it. Mutual exclusion lives
//! entirely in the database, so any number of process instances can run
//! against the same pool.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{DeleteOutcome, FailOutcome, SettleOutcome, Store, StoreError};
use crate::db;
use crate::model::{
    Event, EventFilter, EventPatch, EventStats, NewAttempt, NewEvent, PaymentAttempt,
};
use crate::settlement::{PaymentState, Transition};
use crate::util::now_millis;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_event(&self, new: &NewEvent) -> Result<Event, StoreError> {
        let event = Event::create(new);
        db::events::insert(&self.pool, &event).await?;
        Ok(event)
    }

    async fn event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(db::events::find_by_id(&self.pool, id).await?)
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        Ok(db::events::list(&self.pool, filter).await?)
    }

    async fn update_event(
        &self,
        id: Uuid,
        patch: &EventPatch,
    ) -> Result<Option<Event>, StoreError> {
        Ok(db::events::update(&self.pool, id, patch).await?)
    }

    async fn delete_event(&self, id: Uuid) -> Result<DeleteOutcome, StoreError> {
        match db::events::delete(&self.pool, id).await {
            Ok(true) => Ok(DeleteOutcome::Deleted),
            Ok(false) => Ok(DeleteOutcome::NotFound),
            Err(e)
                if e.as_database_error()
                    .is_some_and(|db| db.is_foreign_key_violation()) =>
            {
                Ok(DeleteOutcome::HasAttempts)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn event_stats(&self, id: Uuid) -> Result<Option<EventStats>, StoreError> {
        Ok(db::events::stats(&self.pool, id).await?)
    }

    async fn create_attempt(&self, new: &NewAttempt) -> Result<PaymentAttempt, StoreError> {
        let attempt = PaymentAttempt::create(new);
        db::payments::insert(&self.pool, &attempt).await?;
        Ok(attempt)
    }

    async fn attempt(&self, id: Uuid) -> Result<Option<PaymentAttempt>, StoreError> {
        Ok(db::payments::find_by_id(&self.pool, id).await?)
    }

    async fn attempt_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentAttempt>, StoreError> {
        Ok(db::payments::find_by_reference(&self.pool, reference).await?)
    }

    async fn attempts_for_buyer(
        &self,
        buyer_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentAttempt>, StoreError> {
        Ok(db::payments::list_for_buyer(&self.pool, buyer_id, limit, offset).await?)
    }

    async fn settle_attempt(&self, reference: &str) -> Result<SettleOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(mut attempt) = db::payments::lock_by_reference(&mut tx, reference).await? else {
            return Ok(SettleOutcome::NotFound);
        };

        match attempt.state.transition(PaymentState::Completed) {
            Transition::NoOp => {
                tx.commit().await?;
                Ok(SettleOutcome::AlreadyCompleted(attempt))
            }
            Transition::Conflict => {
                tx.commit().await?;
                Ok(SettleOutcome::Conflict(attempt))
            }
            Transition::Applied(_) => {
                let reserved =
                    db::events::reserve(&mut tx, attempt.event_id, attempt.quantity).await?;
                let now = now_millis();
                if reserved {
                    db::payments::set_state(
                        &mut tx,
                        attempt.id,
                        PaymentState::Completed.as_db(),
                        None,
                        now,
                    )
                    .await?;
                    tx.commit().await?;
                    attempt.state = PaymentState::Completed;
                    attempt.updated_at = now;
                    Ok(SettleOutcome::Completed(attempt))
                } else {
                    db::payments::set_state(
                        &mut tx,
                        attempt.id,
                        PaymentState::Failed.as_db(),
                        Some("capacity exceeded"),
                        now,
                    )
                    .await?;
                    tx.commit().await?;
                    attempt.state = PaymentState::Failed;
                    attempt.failure_reason = Some("capacity exceeded".to_string());
                    attempt.updated_at = now;
                    Ok(SettleOutcome::CapacityExceeded(attempt))
                }
            }
        }
    }

    async fn fail_attempt(
        &self,
        reference: &str,
        reason: &str,
    ) -> Result<FailOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(mut attempt) = db::payments::lock_by_reference(&mut tx, reference).await? else {
            return Ok(FailOutcome::NotFound);
        };

        match attempt.state.transition(PaymentState::Failed) {
            Transition::NoOp => {
                tx.commit().await?;
                Ok(FailOutcome::AlreadyFailed(attempt))
            }
            Transition::Conflict => {
                tx.commit().await?;
                Ok(FailOutcome::Conflict(attempt))
            }
            Transition::Applied(_) => {
                let now = now_millis();
                db::payments::set_state(
                    &mut tx,
                    attempt.id,
                    PaymentState::Failed.as_db(),
                    Some(reason),
                    now,
                )
                .await?;
                tx.commit().await?;
                attempt.state = PaymentState::Failed;
                attempt.failure_reason = Some(reason.to_string());
                attempt.updated_at = now;
                Ok(FailOutcome::Failed(attempt))
            }
        }
    }

    async fn expire_pending_before(
        &self,
        cutoff_ms: i64,
        reason: &str,
    ) -> Result<u64, StoreError> {
        Ok(db::payments::expire_pending_before(&self.pool, cutoff_ms, reason, now_millis()).await?)
    }
}
