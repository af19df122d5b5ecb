use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;

use crate::db;
use crate::routes::AppState;

/// Health check endpoint handler
pub async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "order-payments-rs",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness: the database answers a trivial query
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match db::ping(&state.pool).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable" })),
            )
        }
    }
}
