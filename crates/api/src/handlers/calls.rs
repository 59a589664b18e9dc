//! # Call Handlers
//!
//! Read and maintenance endpoints for calls. All of them go through the
//! presence coordinator, which owns the durable/ephemeral split.

use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;
use tutorcall_core::models::{
    CallId,
    call::{AttendanceResponse, JoinedMembersResponse, RatificationResponse, ReconcileResponse},
};

use crate::{ApiState, middleware::error_handling::AppError};

/// Identity data of the members currently connected to the call.
#[axum::debug_handler]
pub async fn joined_members(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CallId>,
) -> Result<Json<JoinedMembersResponse>, AppError> {
    let members = state.coordinator.joined_members(id).await?;
    Ok(Json(JoinedMembersResponse {
        call_id: id,
        members,
    }))
}

#[axum::debug_handler]
pub async fn attendance(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CallId>,
) -> Result<Json<AttendanceResponse>, AppError> {
    Ok(Json(state.coordinator.attendance(id).await?))
}

#[axum::debug_handler]
pub async fn ratify(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CallId>,
) -> Result<Json<RatificationResponse>, AppError> {
    Ok(Json(state.coordinator.ratify(id).await?))
}

/// Rebuilds the presence set of the call from its session log.
#[axum::debug_handler]
pub async fn reconcile(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<CallId>,
) -> Result<Json<ReconcileResponse>, AppError> {
    Ok(Json(state.coordinator.reconcile(id).await?))
}
