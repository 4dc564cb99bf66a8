use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::personalization::{
    Feedback, InteractionSample, RecommendationConstraints, RecommendationContext,
};
use crate::response::{ok, AppError};
use crate::routes::body_rejection;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:learner_id/interactions", post(submit_interaction))
        .route("/:learner_id/recommendations", post(recommendations))
        .route("/:learner_id/feedback", post(feedback))
        .route("/:learner_id/needs", get(needs))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationRequest {
    #[serde(flatten)]
    context: RecommendationContext,
    #[serde(default)]
    constraints: RecommendationConstraints,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Accepted {
    learner_id: String,
    accepted: bool,
}

async fn submit_interaction(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
    payload: Result<Json<InteractionSample>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(sample) = payload.map_err(body_rejection)?;
    state
        .engine()
        .submit_interaction(&learner_id, sample)
        .await?;
    Ok(ok(Accepted {
        learner_id,
        accepted: true,
    })
    .into_response())
}

async fn recommendations(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
    payload: Result<Json<RecommendationRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(body_rejection)?;
    let recommendations = state
        .engine()
        .get_recommendations(&learner_id, request.context, request.constraints)
        .await?;
    Ok(ok(recommendations).into_response())
}

async fn feedback(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
    payload: Result<Json<Feedback>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(feedback) = payload.map_err(body_rejection)?;
    state.engine().record_feedback(&learner_id, feedback).await?;
    Ok(ok(Accepted {
        learner_id,
        accepted: true,
    })
    .into_response())
}

async fn needs(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
) -> Result<Response, AppError> {
    let profile = state.engine().need_profile(&learner_id).await?;
    Ok(ok(profile).into_response())
}
