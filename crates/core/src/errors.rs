use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] eyre::Report),

    #[error("Presence store error: {0}")]
    Presence(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl CoreError {
    /// Failures of either backing store. Callers may retry the same intent.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Database(_) | CoreError::Presence(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
