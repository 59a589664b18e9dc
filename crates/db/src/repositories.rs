pub mod availability_slot;
pub mod booking;
pub mod call;
pub mod session_event;

use tutorcall_core::errors::CoreError;

/// Repositories that enforce domain rules inside a transaction return
/// `CoreResult` so conflicts stay typed; raw storage failures land here.
pub(crate) fn database<E: Into<eyre::Report>>(err: E) -> CoreError {
    CoreError::Database(err.into())
}
