//! Domain types and the pure parts of the session integrity core: interval
//! arithmetic over availability slots and attendance evaluation over the
//! session event log. Nothing in this crate performs I/O.

pub mod attendance;
pub mod errors;
pub mod models;
pub mod slots;
