use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::personalization::{Response as AnswerResponse, SessionConfig};
use crate::response::{ok, AppError};
use crate::routes::body_rejection;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_session))
        .route("/:session_id", get(get_session))
        .route("/:session_id/responses", post(submit_response))
        .route("/:session_id/complete", post(complete_session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    learner_id: String,
    subject: String,
    #[serde(flatten)]
    config: SessionConfig,
}

async fn start_session(
    State(state): State<AppState>,
    payload: Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(body_rejection)?;
    let session = state
        .engine()
        .start_session(&request.learner_id, &request.subject, request.config)
        .await?;
    Ok((StatusCode::CREATED, ok(session)).into_response())
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, AppError> {
    let session = state.engine().get_session(&session_id).await?;
    Ok(ok(session).into_response())
}

async fn submit_response(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Result<Json<AnswerResponse>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(answer) = payload.map_err(body_rejection)?;
    let outcome = state.engine().submit_response(&session_id, answer).await?;
    Ok(ok(outcome).into_response())
}

async fn complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, AppError> {
    let results = state.engine().complete_session(&session_id).await?;
    Ok(ok(results).into_response())
}
