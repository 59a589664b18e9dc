use crate::{models::DbAvailabilitySlot, repositories::database};
use chrono::{DateTime, Utc};
use eyre::Result;
use sqlx::{PgConnection, Pool, Postgres};
use tutorcall_core::{
    errors::{CoreError, CoreResult},
    models::{interval::Interval, slot::SlotDraft},
    slots,
};

const SLOT_COLUMNS: &str = "id, owner_id, start_time, end_time, deleted, created_at";

/// Validates the drafts against the owner's live slots and inserts them atomically.
pub async fn create_slots(
    pool: &Pool<Postgres>,
    owner_id: i64,
    drafts: &[SlotDraft],
    now: DateTime<Utc>,
) -> CoreResult<Vec<DbAvailabilitySlot>> {
    let mut tx = pool.begin().await.map_err(database)?;

    // Serialize concurrent edits of one owner's calendar.
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(owner_id)
        .execute(&mut *tx)
        .await
        .map_err(database)?;

    let existing: Vec<Interval> = live_slots_by_owner(&mut tx, owner_id)
        .await
        .map_err(database)?
        .into_iter()
        .map(|row| Interval::new(row.start_time, row.end_time))
        .collect::<CoreResult<_>>()?;

    let intervals = slots::validate_slots(&existing, drafts, now)?;

    let mut created = Vec::with_capacity(intervals.len());
    for interval in intervals {
        let slot = sqlx::query_as::<_, DbAvailabilitySlot>(&format!(
            r#"
            INSERT INTO availability_slots (owner_id, start_time, end_time, deleted, created_at)
            VALUES ($1, $2, $3, FALSE, $4)
            RETURNING {}
            "#,
            SLOT_COLUMNS
        ))
        .bind(owner_id)
        .bind(interval.start())
        .bind(interval.end())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(database)?;
        created.push(slot);
    }

    tx.commit().await.map_err(database)?;

    tracing::debug!("Created {} slots for owner {}", created.len(), owner_id);
    Ok(created)
}

pub async fn get_slot_by_id(pool: &Pool<Postgres>, id: i64) -> Result<Option<DbAvailabilitySlot>> {
    let slot = sqlx::query_as::<_, DbAvailabilitySlot>(&format!(
        "SELECT {} FROM availability_slots WHERE id = $1 AND deleted = FALSE",
        SLOT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(slot)
}

pub(crate) async fn lock_slot(
    conn: &mut PgConnection,
    id: i64,
) -> Result<Option<DbAvailabilitySlot>> {
    let slot = sqlx::query_as::<_, DbAvailabilitySlot>(&format!(
        "SELECT {} FROM availability_slots WHERE id = $1 AND deleted = FALSE FOR UPDATE",
        SLOT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(slot)
}

async fn live_slots_by_owner(
    conn: &mut PgConnection,
    owner_id: i64,
) -> Result<Vec<DbAvailabilitySlot>> {
    let slots = sqlx::query_as::<_, DbAvailabilitySlot>(&format!(
        r#"
        SELECT {}
        FROM availability_slots
        WHERE owner_id = $1 AND deleted = FALSE
        ORDER BY start_time ASC
        "#,
        SLOT_COLUMNS
    ))
    .bind(owner_id)
    .fetch_all(conn)
    .await?;

    Ok(slots)
}

/// Marks the slot deleted and cancels bookings that have not started yet,
/// together with their calls. Returns the number of canceled bookings.
pub async fn delete_slot(pool: &Pool<Postgres>, id: i64, now: DateTime<Utc>) -> CoreResult<usize> {
    let mut tx = pool.begin().await.map_err(database)?;

    lock_slot(&mut tx, id)
        .await
        .map_err(database)?
        .ok_or_else(|| CoreError::NotFound(format!("Slot with ID {} not found", id)))?;

    let call_ids = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE bookings
        SET canceled = TRUE
        WHERE slot_id = $1 AND canceled = FALSE AND start_time > $2
        RETURNING call_id
        "#,
    )
    .bind(id)
    .bind(now)
    .fetch_all(&mut *tx)
    .await
    .map_err(database)?;

    crate::repositories::call::cancel_calls(&mut tx, &call_ids)
        .await
        .map_err(database)?;

    sqlx::query("UPDATE availability_slots SET deleted = TRUE WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(database)?;

    tx.commit().await.map_err(database)?;

    tracing::debug!("Deleted slot {}, canceled {} bookings", id, call_ids.len());
    Ok(call_ids.len())
}
