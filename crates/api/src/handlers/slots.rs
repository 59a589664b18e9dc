//! # Slot Handlers
//!
//! Thin wrappers over the slot repositories. Interval rules live in
//! `tutorcall_core::slots`; the repositories apply them inside transactions
//! so concurrent requests cannot both pass the same check.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use tutorcall_core::{
    errors::CoreError,
    models::{
        BookingId, SlotId,
        interval::Interval,
        slot::{
            AvailabilitySlot, Booking, BookingRequest, BookingResponse, CreateSlotsRequest,
            CreateSlotsResponse, DeleteSlotResponse, FreeSubSlotsResponse,
        },
    },
    slots,
};
use tutorcall_db::repositories::{availability_slot, booking};

use crate::{ApiState, middleware::error_handling::AppError};

#[derive(Debug, Deserialize)]
pub struct SubSlotQuery {
    /// Booking to leave out, used when editing that booking
    pub exclude: Option<BookingId>,
}

#[axum::debug_handler]
pub async fn create_slots(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<CreateSlotsRequest>,
) -> Result<Json<CreateSlotsResponse>, AppError> {
    if payload.slots.is_empty() {
        return Err(AppError(CoreError::Validation(
            "At least one slot is required".to_string(),
        )));
    }
    // Reject malformed ranges before touching the database
    for draft in &payload.slots {
        Interval::new(draft.start, draft.end)?;
    }

    let rows = availability_slot::create_slots(
        &state.db_pool,
        payload.owner_id,
        &payload.slots,
        Utc::now(),
    )
    .await?;

    let slots = rows
        .into_iter()
        .map(AvailabilitySlot::try_from)
        .collect::<eyre::Result<Vec<_>>>()?;
    info!(owner_id = payload.owner_id, count = slots.len(), "Created slots");

    Ok(Json(CreateSlotsResponse { slots }))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<SlotId>,
) -> Result<Json<DeleteSlotResponse>, AppError> {
    let canceled_bookings = availability_slot::delete_slot(&state.db_pool, id, Utc::now()).await?;
    info!(slot_id = id, canceled_bookings, "Deleted slot");

    Ok(Json(DeleteSlotResponse {
        slot_id: id,
        canceled_bookings,
    }))
}

#[axum::debug_handler]
pub async fn free_sub_slots(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<SlotId>,
    Query(query): Query<SubSlotQuery>,
) -> Result<Json<FreeSubSlotsResponse>, AppError> {
    let slot: AvailabilitySlot = availability_slot::get_slot_by_id(&state.db_pool, id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Slot with ID {} not found", id)))?
        .try_into()?;

    let bookings = booking::get_active_bookings_by_slot_id(&state.db_pool, id)
        .await?
        .into_iter()
        .map(Booking::try_from)
        .collect::<eyre::Result<Vec<_>>>()?;

    Ok(Json(FreeSubSlotsResponse {
        slot_id: id,
        sub_slots: slots::free_sub_slots(&slot, &bookings, query.exclude),
    }))
}

/// Books part of a slot and creates the call for it.
///
/// The requested interval must fit entirely inside one free sub-slot,
/// otherwise the request fails with a conflict. The slot owner is always a
/// member of the resulting call.
#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<SlotId>,
    Json(payload): Json<BookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let interval = Interval::from_minutes(payload.start, payload.duration)?;

    let (booking, call) = booking::book_slot(
        &state.db_pool,
        id,
        &interval,
        payload.call_type,
        &payload.member_ids,
    )
    .await?;
    info!(slot_id = id, call_id = call.id, %interval, "Booked slot");

    Ok(Json(BookingResponse {
        booking_id: booking.id,
        call_id: call.id,
        interval,
    }))
}
