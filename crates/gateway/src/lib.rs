//! # Session event gateway
//!
//! Real-time handlers for call join/leave intents. Inbound payloads are
//! validated against [`protocol::ClientEvent`], delegated to the
//! [`CallPresenceCoordinator`](tutorcall_presence::CallPresenceCoordinator),
//! and outcomes are fanned out through a [`hub::Broadcaster`].
//!
//! The gateway is transport agnostic: the API crate drives it from
//! WebSocket connections, tests drive it directly.

pub mod error;
pub mod gateway;
pub mod hub;
pub mod protocol;
pub mod registry;

pub use error::GatewayError;
pub use gateway::{Session, SessionEventGateway};
pub use hub::{Broadcaster, Hub};
pub use registry::{ConnectionId, ConnectionRegistry, UserRole};
