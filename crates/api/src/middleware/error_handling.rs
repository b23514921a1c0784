//! # Error Handling Middleware
//!
//! Maps [`SyncError`] to HTTP status codes and a JSON `{"error": ...}` body so
//! every handler fails the same way.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use slotsync_core::errors::SyncError;
use tracing::{error, warn};

/// Application error wrapper that provides HTTP status code mapping
///
/// # Example
///
/// ```
/// use axum::Json;
/// use slotsync_api::middleware::error_handling::AppError;
/// use slotsync_core::errors::SyncError;
///
/// async fn handler(found: bool) -> Result<Json<&'static str>, AppError> {
///     if !found {
///         return Err(SyncError::NotFound("slot view".into()).into());
///     }
///     Ok(Json("ok"))
/// }
/// # fn main() {}
/// ```
#[derive(Debug)]
pub struct AppError(pub SyncError);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::Validation(_) => StatusCode::BAD_REQUEST,
            SyncError::Conflict(_) => StatusCode::CONFLICT,
            SyncError::SendFailed(_) | SyncError::Transport(_) => StatusCode::BAD_GATEWAY,
            SyncError::SyncUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SyncError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_transport() {
            warn!(%status, error = %self.0, "upstream unavailable");
        } else if status.is_server_error() {
            error!(%status, error = %self.0, "request failed");
        }
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        AppError(err)
    }
}

/// Unclassified reports are treated as transport failures.
impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        AppError(SyncError::Transport(err))
    }
}

/// Maps a SyncError straight to an HTTP response
pub fn map_error(err: SyncError) -> Response {
    AppError(err).into_response()
}
