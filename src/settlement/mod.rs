//! Payment orchestration
//!
//! `Settlement` drives every payment attempt from intent creation to its
//! terminal state. It owns no storage and no network client of its own: the
//! [`Store`] and [`PaymentGateway`] collaborators are injected, so the engine
//! runs unchanged against Postgres + Stripe in production and against the
//! in-memory store + mock gateway in tests.

mod state;

pub use state::{InvalidPaymentState, PaymentState, Transition};

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, ErrorCode, ServiceResult};
use crate::gateway::{GatewayError, IntentRequest, IntentStatus, PaymentGateway};
use crate::model::{Availability, NewAttempt};
use crate::store::{FailOutcome, SettleOutcome, Store};
use crate::util::now_millis;

/// Per-order ticket limit, matching the storefront's validation.
pub const MAX_TICKETS_PER_ATTEMPT: i32 = 10;

/// What the buyer's browser needs to finish checkout.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreatedAttempt {
    pub attempt_id: Uuid,
    pub client_secret: String,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Clone)]
pub struct Settlement {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl Settlement {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>, currency: &str) -> Self {
        Self {
            store,
            gateway,
            currency: currency.to_string(),
        }
    }

    /// Advisory availability read. Does not prevent a later reserve from
    /// racing past it; used for fast-fail UX before opening an intent.
    pub async fn availability(&self, event_id: Uuid, quantity: i32) -> ServiceResult<Availability> {
        if quantity < 1 {
            return Err(AppError::validation("quantity must be positive").into());
        }
        let event = self
            .store
            .event(event_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::EventNotFound))?;
        let remaining = event.remaining();
        Ok(Availability {
            available: event.is_active && !event.is_sold_out && remaining >= quantity,
            remaining,
            sold_out: event.is_sold_out,
        })
    }

    /// Open a gateway intent and persist the PENDING attempt.
    ///
    /// The availability check here is only advisory; the commit-time reserve
    /// is the oversell guard. A gateway failure persists nothing.
    pub async fn create_attempt(
        &self,
        buyer_id: &str,
        event_id: Uuid,
        quantity: i32,
    ) -> ServiceResult<CreatedAttempt> {
        if !(1..=MAX_TICKETS_PER_ATTEMPT).contains(&quantity) {
            return Err(AppError::validation(format!(
                "ticket quantity must be between 1 and {MAX_TICKETS_PER_ATTEMPT}"
            ))
            .into());
        }

        let event = self
            .store
            .event(event_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::EventNotFound))?;
        if !event.is_active || event.is_sold_out || event.remaining() < quantity {
            return Err(AppError::new(ErrorCode::EventUnavailable).into());
        }

        let amount_cents = event.price_cents * i64::from(quantity);
        let intent = self
            .gateway
            .create_intent(&IntentRequest {
                amount_cents,
                currency: self.currency.clone(),
                buyer_id: buyer_id.to_string(),
                event_id,
                quantity,
                event_title: event.title.clone(),
            })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, event_id = %event_id, "failed to open payment intent");
                AppError::new(ErrorCode::GatewayError)
            })?;

        let attempt = self
            .store
            .create_attempt(&NewAttempt {
                buyer_id: buyer_id.to_string(),
                event_id,
                quantity,
                amount_cents,
                currency: self.currency.clone(),
                gateway_reference: intent.id,
            })
            .await?;

        tracing::info!(
            attempt_id = %attempt.id,
            event_id = %event_id,
            quantity,
            amount_cents,
            "payment attempt created"
        );

        Ok(CreatedAttempt {
            attempt_id: attempt.id,
            client_secret: intent.client_secret,
            amount_cents,
            currency: attempt.currency,
        })
    }

    /// Idempotent commit keyed by the gateway reference.
    ///
    /// Exactly one commit per attempt ever reaches the ledger; duplicates
    /// and late failure notifications collapse against the terminal state.
    pub async fn commit(&self, reference: &str) -> ServiceResult<SettleOutcome> {
        let outcome = self.store.settle_attempt(reference).await?;
        match &outcome {
            SettleOutcome::Completed(a) => tracing::info!(
                attempt_id = %a.id,
                event_id = %a.event_id,
                quantity = a.quantity,
                "payment completed, tickets reserved"
            ),
            SettleOutcome::AlreadyCompleted(a) => {
                tracing::debug!(attempt_id = %a.id, "duplicate commit ignored")
            }
            SettleOutcome::CapacityExceeded(a) => tracing::warn!(
                attempt_id = %a.id,
                event_id = %a.event_id,
                "commit lost the capacity race, attempt failed"
            ),
            SettleOutcome::Conflict(a) => {
                tracing::warn!(attempt_id = %a.id, "commit refused: attempt already failed")
            }
            SettleOutcome::NotFound => {
                tracing::warn!(reference, "commit for unknown gateway reference")
            }
        }
        Ok(outcome)
    }

    /// Idempotent transition to FAILED; a no-op on terminal records.
    pub async fn fail(&self, reference: &str, reason: &str) -> ServiceResult<FailOutcome> {
        let outcome = self.store.fail_attempt(reference, reason).await?;
        match &outcome {
            FailOutcome::Failed(a) => {
                tracing::info!(attempt_id = %a.id, reason, "payment attempt failed")
            }
            FailOutcome::AlreadyFailed(a) => {
                tracing::debug!(attempt_id = %a.id, "duplicate failure ignored")
            }
            FailOutcome::Conflict(a) => tracing::warn!(
                attempt_id = %a.id,
                "failure notification for completed attempt ignored"
            ),
            FailOutcome::NotFound => {
                tracing::warn!(reference, "failure for unknown gateway reference")
            }
        }
        Ok(outcome)
    }

    /// Synchronous confirmation path: ask the gateway for the intent status
    /// instead of waiting for the webhook. Only a succeeded intent commits.
    pub async fn confirm(&self, reference: &str) -> ServiceResult<SettleOutcome> {
        let status = self.gateway.retrieve_intent(reference).await.map_err(|e| match e {
            GatewayError::IntentNotFound(_) => AppError::new(ErrorCode::PaymentNotFound),
            other => {
                tracing::error!(error = %other, "failed to retrieve payment intent");
                AppError::new(ErrorCode::GatewayError)
            }
        })?;

        if status != IntentStatus::Succeeded {
            return Err(AppError::with_message(
                ErrorCode::PaymentNotSucceeded,
                format!("payment intent status is {status}"),
            )
            .into());
        }

        self.commit(reference).await
    }

    /// Fail PENDING attempts that never received a gateway confirmation.
    /// Runs from the background sweeper; the transition is the same
    /// idempotent fail, so racing a late commit is harmless.
    pub async fn expire_stale(&self, ttl_ms: i64) -> ServiceResult<u64> {
        let cutoff = now_millis() - ttl_ms;
        let expired = self
            .store
            .expire_pending_before(cutoff, "expired before gateway confirmation")
            .await?;
        if expired > 0 {
            tracing::info!(expired, "failed stale pending payment attempts");
        }
        Ok(expired)
    }
}
