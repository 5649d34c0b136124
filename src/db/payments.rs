use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::model::PaymentAttempt;

pub async fn insert(pool: &PgPool, attempt: &PaymentAttempt) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO payment_attempts (id, buyer_id, event_id, quantity, amount_cents,
                                       currency, gateway_reference, state, failure_reason,
                                       created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(attempt.id)
    .bind(&attempt.buyer_id)
    .bind(attempt.event_id)
    .bind(attempt.quantity)
    .bind(attempt.amount_cents)
    .bind(&attempt.currency)
    .bind(&attempt.gateway_reference)
    .bind(attempt.state.as_db())
    .bind(attempt.failure_reason.as_deref())
    .bind(attempt.created_at)
    .bind(attempt.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<PaymentAttempt>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_attempts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_reference(
    pool: &PgPool,
    reference: &str,
) -> Result<Option<PaymentAttempt>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_attempts WHERE gateway_reference = $1")
        .bind(reference)
        .fetch_optional(pool)
        .await
}

/// Lock the attempt row for the duration of the settlement transaction, so
/// concurrent duplicate notifications for the same reference serialize here.
pub async fn lock_by_reference(
    conn: &mut PgConnection,
    reference: &str,
) -> Result<Option<PaymentAttempt>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_attempts WHERE gateway_reference = $1 FOR UPDATE")
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn set_state(
    conn: &mut PgConnection,
    id: Uuid,
    state: &str,
    failure_reason: Option<&str>,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE payment_attempts
            SET state = $2, failure_reason = COALESCE($3, failure_reason), updated_at = $4
          WHERE id = $1",
    )
    .bind(id)
    .bind(state)
    .bind(failure_reason)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_for_buyer(
    pool: &PgPool,
    buyer_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<PaymentAttempt>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM payment_attempts
          WHERE buyer_id = $1
          ORDER BY created_at DESC
          LIMIT $2 OFFSET $3",
    )
    .bind(buyer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Bulk-fail PENDING attempts older than the cutoff. Per-row this is the
/// same guarded transition as `fail_attempt`: the state filter makes a
/// concurrent commit and the sweeper mutually exclusive.
pub async fn expire_pending_before(
    pool: &PgPool,
    cutoff: i64,
    reason: &str,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE payment_attempts
            SET state = 'failed', failure_reason = $2, updated_at = $3
          WHERE state = 'pending' AND created_at < $1",
    )
    .bind(cutoff)
    .bind(reason)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
