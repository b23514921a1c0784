use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::{ApiState, handlers};

pub fn routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/views/conversations", post(handlers::conversations::open))
        .route(
            "/api/views/conversations/:id",
            get(handlers::conversations::get).delete(handlers::conversations::close),
        )
        .route(
            "/api/views/conversations/:id/messages",
            post(handlers::conversations::send),
        )
        .route(
            "/api/views/conversations/:id/messages/:message_id/retry",
            post(handlers::conversations::retry),
        )
        .route(
            "/api/views/conversations/:id/typing",
            post(handlers::conversations::typing),
        )
        .route(
            "/api/views/conversations/:id/history",
            post(handlers::conversations::load_older),
        )
}
