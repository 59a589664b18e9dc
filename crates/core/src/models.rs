pub mod call;
pub mod interval;
pub mod session_event;
pub mod slot;

pub type UserId = i64;
pub type CallId = i64;
pub type SlotId = i64;
pub type BookingId = i64;
