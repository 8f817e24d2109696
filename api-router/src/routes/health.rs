use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Liveness probe: always returns 200 to indicate the process is running.
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// Readiness probe: 200 when both the metadata store and the object store
/// answer, else 503.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let db_error = state.db.client.query("RETURN true").await.err().map(|e| e.to_string());
    let storage_error = state
        .storage
        .exists("readiness-probe")
        .await
        .err()
        .map(|e| e.to_string());

    let check = |error: &Option<String>| if error.is_some() { "fail" } else { "ok" };
    let checks = json!({ "db": check(&db_error), "storage": check(&storage_error) });

    if db_error.is_none() && storage_error.is_none() {
        return (StatusCode::OK, Json(json!({ "status": "ok", "checks": checks })));
    }

    let reason = [db_error, storage_error]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("; ");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "error", "checks": checks, "reason": reason })),
    )
}
