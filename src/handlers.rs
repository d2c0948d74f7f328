pub mod admin;
pub mod auth;
pub mod health;
pub mod predict;

use crate::schemas::ErrorResponse;
use axum::{http::StatusCode, response::Json};
use tracing::error;

/// Log an infrastructure failure and turn it into a `500` with a stable error code.
pub(crate) fn internal_error(
    context: &str,
    code: &str,
    err: impl std::fmt::Display,
) -> (StatusCode, Json<ErrorResponse>) {
    error!("{}: {}", context, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(
            format!("Internal server error while {}", context.to_lowercase()),
            code,
        )),
    )
}
