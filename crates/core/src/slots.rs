//! # Slot Arithmetic
//!
//! Interval operations that turn a tutor's declared availability into
//! bookable sub-slots and keep bookings from overlapping.
//!
//! ## Subtraction
//!
//! The central operation removes a set of holes (existing bookings) from a
//! base interval (an availability slot):
//!
//! 1. Drop holes that do not intersect the base
//! 2. Sort the remaining holes by start time
//! 3. Sweep a cursor from `base.start`, emitting the gap before each hole and
//!    advancing the cursor past it. Overlapping and adjacent holes merge
//!    naturally because the cursor only moves forward.
//! 4. Emit the tail gap up to `base.end`
//!
//! Zero-length gaps are never emitted, so the result is the ordered list of
//! maximal free intervals. O(n log n) for the sort, O(n) for the sweep.

use chrono::{DateTime, Duration, Utc};

use crate::{
    errors::{CoreError, CoreResult},
    models::{
        interval::Interval,
        slot::{AvailabilitySlot, Booking, SlotDraft, SubSlot},
        BookingId,
    },
};

/// Removes `holes` from `base` and returns the free gaps in ascending order.
pub fn subtract(base: &Interval, holes: &[Interval]) -> Vec<Interval> {
    let mut holes: Vec<&Interval> = holes.iter().filter(|hole| hole.intersects(base)).collect();
    holes.sort_by_key(|hole| hole.start);

    let mut free = Vec::new();
    let mut cursor = base.start;

    for hole in holes {
        if hole.start > cursor {
            free.push(Interval {
                start: cursor,
                end: hole.start,
            });
        }
        cursor = cursor.max(hole.end);
        if cursor >= base.end {
            return free;
        }
    }

    if cursor < base.end {
        free.push(Interval {
            start: cursor,
            end: base.end,
        });
    }

    free
}

/// Free sub-slots of `slot` given every booking that references it.
///
/// `excluding` skips one booking so that an edit of that booking is checked
/// against everything except itself.
pub fn free_sub_slots(
    slot: &AvailabilitySlot,
    bookings: &[Booking],
    excluding: Option<BookingId>,
) -> Vec<SubSlot> {
    let holes: Vec<Interval> = bookings
        .iter()
        .filter(|booking| booking.slot_id == slot.id)
        .filter(|booking| Some(booking.id) != excluding)
        .map(|booking| booking.interval)
        .collect();

    subtract(&slot.interval, &holes)
        .into_iter()
        .map(|interval| SubSlot {
            parent: slot.id,
            interval,
        })
        .collect()
}

/// Accepts `proposed` only if it lies entirely inside exactly one free sub-slot.
///
/// Returns the free sub-slot that will host the booking. The proposal is
/// never clipped to fit.
pub fn check_booking(
    slot: &AvailabilitySlot,
    bookings: &[Booking],
    proposed: &Interval,
    excluding: Option<BookingId>,
) -> CoreResult<SubSlot> {
    let hosts: Vec<SubSlot> = free_sub_slots(slot, bookings, excluding)
        .into_iter()
        .filter(|free| free.interval.contains(proposed))
        .collect();

    match hosts.as_slice() {
        [host] => Ok(*host),
        _ => Err(CoreError::Conflict(format!(
            "Interval {} is not available in slot {}",
            proposed, slot.id
        ))),
    }
}

/// Divides a slot into consecutive sub-slots of `minutes` each.
/// A trailing remainder shorter than `minutes` is dropped.
pub fn split(slot: &AvailabilitySlot, minutes: i64) -> CoreResult<Vec<SubSlot>> {
    if minutes <= 0 {
        return Err(CoreError::Validation(format!(
            "Sub-slot length must be positive, got {} minutes",
            minutes
        )));
    }

    let step = Duration::minutes(minutes);
    let mut sub_slots = Vec::new();
    let mut start = slot.interval.start;

    while start + step <= slot.interval.end {
        sub_slots.push(SubSlot {
            parent: slot.id,
            interval: Interval {
                start,
                end: start + step,
            },
        });
        start += step;
    }

    Ok(sub_slots)
}

/// Subtracts booked sub-slots from each slot, considering only sub-slots whose
/// parent is that slot and that lie inside it.
pub fn subtract_batch(slots: &[AvailabilitySlot], sub_slots: &[SubSlot]) -> Vec<SubSlot> {
    slots
        .iter()
        .flat_map(|slot| {
            let holes: Vec<Interval> = sub_slots
                .iter()
                .filter(|sub| sub.parent == slot.id && slot.interval.contains(&sub.interval))
                .map(|sub| sub.interval)
                .collect();

            subtract(&slot.interval, &holes)
                .into_iter()
                .map(move |interval| SubSlot {
                    parent: slot.id,
                    interval,
                })
        })
        .collect()
}

pub fn is_intersecting(target: &Interval, others: &[Interval]) -> bool {
    others.iter().any(|other| target.intersects(other))
}

/// Validates new slots for one owner against the owner's existing slots.
///
/// A draft is malformed when it is empty, inverted or starts in the past.
/// The combined set conflicts when two slots intersect or share a start or an
/// end.
pub fn validate_slots(
    existing: &[Interval],
    drafts: &[SlotDraft],
    now: DateTime<Utc>,
) -> CoreResult<Vec<Interval>> {
    let mut proposed = Vec::with_capacity(drafts.len());
    for draft in drafts {
        if draft.start < now {
            return Err(CoreError::Validation(format!(
                "Slot starting at {} is in the past",
                draft.start
            )));
        }
        proposed.push(Interval::new(draft.start, draft.end)?);
    }

    let all: Vec<&Interval> = existing.iter().chain(proposed.iter()).collect();
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            if a.start == b.start || a.end == b.end || a.intersects(b) {
                return Err(CoreError::Conflict(format!(
                    "Slot {} conflicts with slot {}",
                    a, b
                )));
            }
        }
    }

    Ok(proposed)
}
