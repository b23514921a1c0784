use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::{ApiState, handlers};

pub fn routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/push", post(handlers::push::ingest))
        .route("/ws/push", get(handlers::push::upstream))
}
