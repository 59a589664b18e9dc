use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tutorcall_core::models::{
    call::{Call, CallType, PopulatedMember},
    interval::Interval,
    session_event::{SessionEvent, SessionEventType},
    slot::{AvailabilitySlot, Booking},
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbAvailabilitySlot {
    pub id: i64,
    pub owner_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbCall {
    pub id: i64,
    pub call_type: String,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub ratified: bool,
    pub canceled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbCallMember {
    pub call_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbPopulatedMember {
    pub call_id: i64,
    pub user_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbBooking {
    pub id: i64,
    pub slot_id: i64,
    pub call_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub canceled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbSessionEvent {
    pub id: i64,
    pub session_id: i64,
    pub user_id: i64,
    pub event_type: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbAvailabilitySlot> for AvailabilitySlot {
    type Error = eyre::Report;

    fn try_from(row: DbAvailabilitySlot) -> Result<Self> {
        Ok(AvailabilitySlot {
            id: row.id,
            owner_id: row.owner_id,
            interval: Interval::new(row.start_time, row.end_time)
                .wrap_err_with(|| format!("Slot {} has an invalid range", row.id))?,
        })
    }
}

impl TryFrom<DbCall> for Call {
    type Error = eyre::Report;

    fn try_from(row: DbCall) -> Result<Self> {
        Ok(Call {
            id: row.id,
            call_type: row.call_type.parse::<CallType>()?,
            scheduled: Interval::new(row.scheduled_start, row.scheduled_end)
                .wrap_err_with(|| format!("Call {} has an invalid schedule", row.id))?,
            ratified: row.ratified,
            canceled: row.canceled,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<DbBooking> for Booking {
    type Error = eyre::Report;

    fn try_from(row: DbBooking) -> Result<Self> {
        Ok(Booking {
            id: row.id,
            slot_id: row.slot_id,
            call_id: row.call_id,
            interval: Interval::new(row.start_time, row.end_time)
                .wrap_err_with(|| format!("Booking {} has an invalid range", row.id))?,
        })
    }
}

impl TryFrom<DbSessionEvent> for SessionEvent {
    type Error = eyre::Report;

    fn try_from(row: DbSessionEvent) -> Result<Self> {
        Ok(SessionEvent {
            session_id: row.session_id,
            user_id: row.user_id,
            event_type: row.event_type.parse::<SessionEventType>()?,
            created_at: row.created_at,
        })
    }
}

impl From<DbPopulatedMember> for PopulatedMember {
    fn from(row: DbPopulatedMember) -> Self {
        PopulatedMember {
            call_id: row.call_id,
            user_id: row.user_id,
            name: row.name,
            image: row.image,
            role: row.role,
        }
    }
}
