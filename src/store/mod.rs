//! Storage abstraction for events and payment attempts
//!
//! The settlement engine and the API layer depend on [`Store`] rather than a
//! concrete database so the whole core runs against fakes in tests.
//! `settle_attempt` and `fail_attempt` are single operations by contract:
//! the attempt's state transition and the ledger increment must commit
//! together, so the seam exposes the atomic unit instead of separate
//! reserve/transition calls an implementation could tear apart.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    Event, EventFilter, EventPatch, EventStats, NewAttempt, NewEvent, PaymentAttempt,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("duplicate gateway reference: {0}")]
    DuplicateReference(String),
    #[error("event {0} missing for attempt")]
    EventMissing(Uuid),
}

/// Outcome of the atomic settle operation.
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// The attempt was PENDING and the ledger had room: tickets reserved,
    /// attempt COMPLETED.
    Completed(PaymentAttempt),
    /// Duplicate delivery: already COMPLETED, nothing changed.
    AlreadyCompleted(PaymentAttempt),
    /// The attempt was PENDING but the authoritative check failed: the
    /// attempt is now durably FAILED and the ledger is untouched.
    CapacityExceeded(PaymentAttempt),
    /// The attempt had already FAILED; a completed state cannot be reached
    /// from there.
    Conflict(PaymentAttempt),
    /// No attempt with this gateway reference.
    NotFound,
}

/// Outcome of the idempotent fail operation.
#[derive(Debug, Clone)]
pub enum FailOutcome {
    Failed(PaymentAttempt),
    AlreadyFailed(PaymentAttempt),
    /// The attempt already COMPLETED; a late failure notification must not
    /// regress it.
    Conflict(PaymentAttempt),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// The event has payment attempts; the audit trail wins over deletion.
    HasAttempts,
}

#[async_trait]
pub trait Store: Send + Sync {
    // ==================== Event catalog / ledger ====================

    async fn create_event(&self, new: &NewEvent) -> Result<Event, StoreError>;
    async fn event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError>;
    async fn update_event(&self, id: Uuid, patch: &EventPatch)
    -> Result<Option<Event>, StoreError>;
    async fn delete_event(&self, id: Uuid) -> Result<DeleteOutcome, StoreError>;
    async fn event_stats(&self, id: Uuid) -> Result<Option<EventStats>, StoreError>;

    // ==================== Payment attempts ====================

    async fn create_attempt(&self, new: &NewAttempt) -> Result<PaymentAttempt, StoreError>;
    async fn attempt(&self, id: Uuid) -> Result<Option<PaymentAttempt>, StoreError>;
    async fn attempt_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentAttempt>, StoreError>;
    async fn attempts_for_buyer(
        &self,
        buyer_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentAttempt>, StoreError>;

    // ==================== Settlement (atomic) ====================

    /// Commit a payment: reserve tickets and complete the attempt as one
    /// atomic unit, or fail it durably when capacity has run out.
    async fn settle_attempt(&self, reference: &str) -> Result<SettleOutcome, StoreError>;

    /// Idempotent transition to FAILED.
    async fn fail_attempt(&self, reference: &str, reason: &str)
    -> Result<FailOutcome, StoreError>;

    /// Fail all PENDING attempts created before the cutoff; returns how many
    /// were failed. Used by the stale-attempt sweeper.
    async fn expire_pending_before(&self, cutoff_ms: i64, reason: &str)
    -> Result<u64, StoreError>;
}
