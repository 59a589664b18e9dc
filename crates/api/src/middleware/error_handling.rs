//! # Error Handling Middleware
//!
//! Maps domain errors to HTTP status codes and JSON error bodies, so every
//! handler can return `Result<_, AppError>` and use `?` on core and
//! repository results.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;
use tutorcall_core::errors::CoreError;

/// Application error wrapper that provides HTTP status code mapping
#[derive(Debug)]
pub struct AppError(pub CoreError);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::Presence(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self.0);
        }

        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Allows `?` on `CoreResult` in handlers
impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        AppError(err)
    }
}

/// Allows `?` on repository results; they are database failures
impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        AppError(CoreError::Database(err))
    }
}

pub fn map_error(err: CoreError) -> Response {
    AppError(err).into_response()
}
