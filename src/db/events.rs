use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::model::{Event, EventFilter, EventPatch, EventStats};

pub async fn insert(pool: &PgPool, event: &Event) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO events (id, title, description, category, venue, starts_at, ends_at,
                             price_cents, total_tickets, sold_tickets, is_sold_out, is_active,
                             image_url, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.category)
    .bind(&event.venue)
    .bind(event.starts_at)
    .bind(event.ends_at)
    .bind(event.price_cents)
    .bind(event.total_tickets)
    .bind(event.sold_tickets)
    .bind(event.is_sold_out)
    .bind(event.is_active)
    .bind(event.image_url.as_deref())
    .bind(event.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM events WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool, filter: &EventFilter) -> Result<Vec<Event>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM events
          WHERE ($1::text IS NULL OR category = $1)
            AND ($2::text IS NULL
                 OR title ILIKE '%' || $2 || '%'
                 OR description ILIKE '%' || $2 || '%')
            AND ($3::boolean IS NULL OR is_active = $3)
          ORDER BY starts_at ASC
          LIMIT $4 OFFSET $5",
    )
    .bind(filter.category.as_deref())
    .bind(filter.search.as_deref())
    .bind(filter.is_active)
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    patch: &EventPatch,
) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE events SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            category = COALESCE($4, category),
            venue = COALESCE($5, venue),
            starts_at = COALESCE($6, starts_at),
            ends_at = COALESCE($7, ends_at),
            price_cents = COALESCE($8, price_cents),
            image_url = COALESCE($9, image_url),
            is_active = COALESCE($10, is_active)
          WHERE id = $1
          RETURNING *",
    )
    .bind(id)
    .bind(patch.title.as_deref())
    .bind(patch.description.as_deref())
    .bind(patch.category.as_deref())
    .bind(patch.venue.as_deref())
    .bind(patch.starts_at)
    .bind(patch.ends_at)
    .bind(patch.price_cents)
    .bind(patch.image_url.as_deref())
    .bind(patch.is_active)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Authoritative ticket reservation.
///
/// One conditional UPDATE; the row count says whether it applied. Two
/// concurrent reservations can never both pass the `sold + N <= capacity`
/// check on a stale read because the check and the increment are the same
/// statement. Runs on the settlement transaction's connection.
pub async fn reserve(
    conn: &mut PgConnection,
    id: Uuid,
    quantity: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE events
            SET sold_tickets = sold_tickets + $2,
                is_sold_out = sold_tickets + $2 >= total_tickets
          WHERE id = $1 AND sold_tickets + $2 <= total_tickets",
    )
    .bind(id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn stats(pool: &PgPool, id: Uuid) -> Result<Option<EventStats>, sqlx::Error> {
    let row: Option<(i32, i32, i64, i64, i64)> = sqlx::query_as(
        "SELECT e.total_tickets, e.sold_tickets,
                COALESCE(SUM(p.amount_cents) FILTER (WHERE p.state = 'completed'), 0)::bigint,
                COALESCE(SUM(p.quantity) FILTER (WHERE p.state = 'completed'), 0)::bigint,
                COUNT(p.id) FILTER (WHERE p.state = 'completed')
           FROM events e
           LEFT JOIN payment_attempts p ON p.event_id = e.id
          WHERE e.id = $1
          GROUP BY e.id",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(total_tickets, sold_tickets, revenue, tickets, completed)| EventStats {
            total_revenue_cents: revenue,
            tickets_sold: tickets,
            remaining_tickets: total_tickets - sold_tickets,
            completed_payments: completed,
        },
    ))
}
