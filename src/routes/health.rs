use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::personalization::metrics::ComponentStatus;
use crate::response::ok;
use crate::state::AppState;

const RSS_LIMIT_BYTES: f64 = 1_400_000_000.0;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
        .route("/metrics", get(metrics))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    start_time: String,
    uptime: u64,
    cache: &'static str,
    active_sessions: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
    memory_rss_bytes: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricsResponse {
    timestamp: String,
    components: Vec<ComponentStatus>,
    degraded: Vec<String>,
}

async fn root(State(state): State<AppState>) -> Response {
    let response = HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now_iso(),
        start_time: system_time_iso(state.started_at_system()),
        uptime: state.uptime_seconds(),
        cache: state.cache_backend(),
        active_sessions: state.engine().active_session_count(),
    };
    Json(response).into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    let rss = read_rss_bytes();
    let healthy = rss == 0 || (rss as f64) / RSS_LIMIT_BYTES < 0.9;
    let response = LivenessResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
        memory_rss_bytes: rss,
    };
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}

async fn metrics(State(state): State<AppState>) -> Response {
    let components = state.engine().metrics_snapshot();
    let degraded = components
        .iter()
        .filter(|c| c.status == "degraded")
        .map(|c| c.name.clone())
        .collect();
    ok(MetricsResponse {
        timestamp: now_iso(),
        components,
        degraded,
    })
    .into_response()
}

fn system_time_iso(time: std::time::SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Utc> = time.into();
    datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Resident set size from /proc; 0 where unavailable.
fn read_rss_bytes() -> u64 {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return 0;
    };
    status
        .lines()
        .find_map(|line| line.trim_start().strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
        .unwrap_or(0)
}
