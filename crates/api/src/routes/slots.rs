use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;

use crate::{ApiState, handlers};

pub fn routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/slots/compute", post(handlers::slots::compute))
        .route("/api/views/slots", post(handlers::slots::create_view))
        .route(
            "/api/views/slots/:id",
            get(handlers::slots::get_view)
                .put(handlers::slots::update_view)
                .delete(handlers::slots::close_view),
        )
        .route("/api/views/slots/:id/bookings", post(handlers::slots::book))
        .route(
            "/api/views/slots/:id/bookings/:appointment_id",
            put(handlers::slots::reschedule).delete(handlers::slots::cancel),
        )
}
