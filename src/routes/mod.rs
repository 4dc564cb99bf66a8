mod health;
mod learners;
mod sessions;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::response::{json_error, AppError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/learners", learners::router())
        .nest("/api/sessions", sessions::router())
        .nest("/health", health::router())
        .fallback(fallback_handler)
        .with_state(state)
}

/// Malformed bodies are reported in the same envelope as validation failures.
pub(crate) fn body_rejection(rejection: JsonRejection) -> AppError {
    AppError::validation(rejection.body_text())
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "route not found").into_response()
}
