use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::{ApiState, handlers};

pub fn routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/calls/:id/members", get(handlers::calls::joined_members))
        .route("/api/calls/:id/attendance", get(handlers::calls::attendance))
        .route("/api/calls/:id/ratify", post(handlers::calls::ratify))
        .route("/api/calls/:id/reconcile", post(handlers::calls::reconcile))
}
