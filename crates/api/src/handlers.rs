/// Call membership, attendance and ratification
pub mod calls;
/// Availability slots and bookings
pub mod slots;
/// WebSocket transport for the session event gateway
pub mod ws;
