//! # Call presence
//!
//! Keeps the durable call membership ledger and the ephemeral "who is
//! connected right now" set in step.
//!
//! - [`store`] is the key-value interface of the ephemeral backend
//! - [`memory`] is an in-process backend with per-key TTL
//! - [`handle`] owns the lazily acquired, idle-released backend connection
//! - [`coordinator`] orchestrates create/join/leave and the post-session
//!   attendance and ratification decisions
//!
//! The durable store is always written first and is the recovery source;
//! presence can be rebuilt from the session event log at any time with
//! [`CallPresenceCoordinator::reconcile`].

pub mod config;
pub mod coordinator;
pub mod handle;
pub mod memory;
pub mod store;

pub use config::PresenceConfig;
pub use coordinator::{CallPresenceCoordinator, JoinMode, JoinOutcome};
pub use handle::PresenceHandle;
pub use memory::MemoryPresence;
