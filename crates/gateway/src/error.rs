use thiserror::Error;
use tutorcall_core::errors::CoreError;

use crate::registry::ConnectionId;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Connection {0} has been superseded")]
    Superseded(ConnectionId),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl GatewayError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, GatewayError::Malformed(_))
    }
}
