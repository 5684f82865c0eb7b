use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use super::AppState;

/// Liveness: the process is up. Touches no dependencies.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Readiness: runs a trivial query so a broken database turns the endpoint
/// 503 instead of answering 200 from a dead pool.
pub async fn ready(State(state): State<AppState>) -> Response {
    match state.repo.count_orders().await {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({"status": "ready"}))).into_response(),
        Err(err) => {
            warn!(error = %err, "readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unavailable",
                    "error": err.to_string(),
                })),
            )
                .into_response()
        }
    }
}
