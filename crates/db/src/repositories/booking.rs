use crate::{
    models::{DbBooking, DbCall},
    repositories::{availability_slot, call, database},
};
use eyre::Result;
use sqlx::{PgConnection, Pool, Postgres};
use tutorcall_core::{
    errors::{CoreError, CoreResult},
    models::{
        call::CallType,
        interval::Interval,
        slot::{AvailabilitySlot, Booking},
    },
    slots,
};

const BOOKING_COLUMNS: &str = "id, slot_id, call_id, start_time, end_time, canceled";

/// Books `proposed` inside a slot and creates the call that will host it.
///
/// The slot row is locked for the duration of the transaction, so two
/// concurrent bookings of the same slot are checked one after the other and
/// overlapping requests cannot both commit. The slot owner is always made a
/// member of the call.
pub async fn book_slot(
    pool: &Pool<Postgres>,
    slot_id: i64,
    proposed: &Interval,
    call_type: CallType,
    member_ids: &[i64],
) -> CoreResult<(DbBooking, DbCall)> {
    let mut tx = pool.begin().await.map_err(database)?;

    let slot: AvailabilitySlot = availability_slot::lock_slot(&mut tx, slot_id)
        .await
        .map_err(database)?
        .ok_or_else(|| CoreError::NotFound(format!("Slot with ID {} not found", slot_id)))?
        .try_into()
        .map_err(CoreError::Database)?;

    let bookings = active_bookings(&mut tx, slot_id)
        .await
        .map_err(database)?
        .into_iter()
        .map(Booking::try_from)
        .collect::<Result<Vec<_>>>()
        .map_err(CoreError::Database)?;

    // Dropping `tx` on a conflict rolls back and releases the lock.
    slots::check_booking(&slot, &bookings, proposed, None)?;

    let mut members: Vec<i64> = member_ids.to_vec();
    members.push(slot.owner_id);
    members.sort_unstable();
    members.dedup();

    let created_call = call::insert_call(&mut tx, call_type, proposed)
        .await
        .map_err(database)?;
    call::insert_members(&mut tx, created_call.id, &members)
        .await
        .map_err(database)?;

    let booking = sqlx::query_as::<_, DbBooking>(&format!(
        r#"
        INSERT INTO bookings (slot_id, call_id, start_time, end_time, canceled)
        VALUES ($1, $2, $3, $4, FALSE)
        RETURNING {}
        "#,
        BOOKING_COLUMNS
    ))
    .bind(slot_id)
    .bind(created_call.id)
    .bind(proposed.start())
    .bind(proposed.end())
    .fetch_one(&mut *tx)
    .await
    .map_err(database)?;

    tx.commit().await.map_err(database)?;

    tracing::debug!(
        "Booked slot {}: booking={}, call={}, interval={}",
        slot_id, booking.id, created_call.id, proposed
    );
    Ok((booking, created_call))
}

pub async fn get_active_bookings_by_slot_id(
    pool: &Pool<Postgres>,
    slot_id: i64,
) -> Result<Vec<DbBooking>> {
    let mut conn = pool.acquire().await?;
    active_bookings(&mut conn, slot_id).await
}

async fn active_bookings(conn: &mut PgConnection, slot_id: i64) -> Result<Vec<DbBooking>> {
    let bookings = sqlx::query_as::<_, DbBooking>(&format!(
        r#"
        SELECT {}
        FROM bookings
        WHERE slot_id = $1 AND canceled = FALSE
        ORDER BY start_time ASC
        "#,
        BOOKING_COLUMNS
    ))
    .bind(slot_id)
    .fetch_all(conn)
    .await?;

    Ok(bookings)
}
