use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use adaptive_engine::state::AppState;

mod common;

fn create_test_app() -> Router {
    adaptive_engine::create_app(AppState::new(Arc::new(common::engine()), "memory"))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_root() {
    let (status, body) = send(create_test_app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cache"], "memory");
    assert_eq!(body["activeSessions"], 0);
}

#[tokio::test]
async fn test_health_live() {
    let (status, body) = send(create_test_app(), get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_health_metrics_lists_components() {
    let app = create_test_app();
    let (status, _) = send(
        app.clone(),
        post_json("/api/learners/learner-1/recommendations", json!({ "subject": "math" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app, get("/health/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let components = body["data"]["components"].as_array().unwrap();
    assert!(!components.is_empty());
    assert!(body["data"]["degraded"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_submit_interaction_accepted() {
    let sample = json!({
        "timestamp": 1_700_000_000_000_i64,
        "metrics": { "reading": { "wordsPerMinute": 120.0, "accuracy": 0.95 } },
        "responseLatencyMs": 2400
    });
    let (status, body) = send(
        create_test_app(),
        post_json("/api/learners/learner-1/interactions", sample),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["learnerId"], "learner-1");
    assert_eq!(body["data"]["accepted"], true);
}

#[tokio::test]
async fn test_interaction_for_another_learner_is_rejected() {
    let sample = json!({ "learnerId": "someone-else", "timestamp": 1 });
    let (status, body) = send(
        create_test_app(),
        post_json("/api/learners/learner-1/interactions", sample),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_recommendations_envelope() {
    let request = json!({
        "subject": "math",
        "constraints": { "maxResults": 4, "contentTypes": ["quiz"] }
    });
    let (status, body) = send(
        create_test_app(),
        post_json("/api/learners/learner-1/recommendations", request),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let recs = body["data"].as_array().unwrap();
    assert_eq!(recs.len(), 4);
    for rec in recs {
        assert_eq!(rec["metadata"]["contentType"], "quiz");
        let score = rec["fusedScore"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&score));
    }
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/learners/learner-1/recommendations")
        .header("content-type", "application/json")
        .body(Body::from("{\"subject\": "))
        .unwrap();
    let (status, body) = send(create_test_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_feedback_out_of_range() {
    let (status, body) = send(
        create_test_app(),
        post_json(
            "/api/learners/learner-1/feedback",
            json!({ "contentId": "quiz-01", "reward": 1.5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_needs_for_unknown_learner_is_empty() {
    let (status, body) = send(create_test_app(), get("/api/learners/nobody/needs")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["needs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = create_test_app();

    let (status, body) = send(
        app.clone(),
        post_json(
            "/api/sessions",
            json!({ "learnerId": "learner-1", "subject": "math", "maxQuestions": 5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["currentDifficulty"], "medium");
    let question = body["data"]["currentQuestionId"].as_str().unwrap().to_string();

    let (_, health) = send(app.clone(), get("/health")).await;
    assert_eq!(health["activeSessions"], 1);

    let answer = json!({
        "questionId": question,
        "correct": true,
        "latencyMs": 1500,
        "confidence": 0.9
    });
    let (status, body) = send(
        app.clone(),
        post_json(&format!("/api/sessions/{session_id}/responses"), answer.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nextDifficulty"], "hard");
    assert_eq!(body["data"]["difficultyState"]["direction"], "increase");

    let (status, body) = send(app.clone(), get(&format!("/api/sessions/{session_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["history"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        app.clone(),
        post_json(&format!("/api/sessions/{session_id}/complete"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalResponses"], 1);
    assert_eq!(body["data"]["correctResponses"], 1);

    let (_, health) = send(app.clone(), get("/health")).await;
    assert_eq!(health["activeSessions"], 0);

    let (status, body) = send(
        app,
        post_json(&format!("/api/sessions/{session_id}/responses"), answer),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SESSION_CLOSED");
}

#[tokio::test]
async fn test_unknown_session() {
    let (status, body) = send(create_test_app(), get("/api/sessions/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, body) = send(create_test_app(), get("/api/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}
