use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;

use crate::{ApiState, handlers};

pub fn routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/slots", post(handlers::slots::create_slots))
        .route("/api/slots/:id", delete(handlers::slots::delete_slot))
        .route("/api/slots/:id/subslots", get(handlers::slots::free_sub_slots))
        .route("/api/slots/:id/bookings", post(handlers::slots::book_slot))
}
