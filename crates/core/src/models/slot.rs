use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{call::CallType, interval::Interval, BookingId, CallId, SlotId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: SlotId,
    pub owner_id: UserId,
    pub interval: Interval,
}

/// A free (or booked) piece of a parent slot. Derived on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSlot {
    pub parent: SlotId,
    pub interval: Interval,
}

/// A lesson or interview that occupies part of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub slot_id: SlotId,
    pub call_id: CallId,
    pub interval: Interval,
}

impl Booking {
    pub fn as_sub_slot(&self) -> SubSlot {
        SubSlot {
            parent: self.slot_id,
            interval: self.interval,
        }
    }
}

/// Unvalidated slot boundaries as submitted by an owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDraft {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotsRequest {
    pub owner_id: UserId,
    pub slots: Vec<SlotDraft>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotsResponse {
    pub slots: Vec<AvailabilitySlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeSubSlotsResponse {
    pub slot_id: SlotId,
    pub sub_slots: Vec<SubSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub start: DateTime<Utc>,
    /// Length of the lesson or interview in minutes.
    pub duration: i64,
    pub call_type: CallType,
    pub member_ids: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub booking_id: BookingId,
    pub call_id: CallId,
    pub interval: Interval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSlotResponse {
    pub slot_id: SlotId,
    /// Future bookings canceled together with the slot.
    pub canceled_bookings: usize,
}
