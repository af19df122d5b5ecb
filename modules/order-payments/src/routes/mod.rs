//! HTTP routing and shared handler plumbing

pub mod payments;
pub mod reports;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{require_bearer, JwtKeys};
use crate::health::{health, ready};
use crate::metrics::Metrics;
use crate::middleware::metrics::metrics_middleware;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt: Arc<JwtKeys>,
    pub metrics: Metrics,
    pub payment_timeout: Duration,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error response wrapper for proper HTTP error handling
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    /// Server fault; the detail goes to the log, never to the caller
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "request_failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

async fn render_metrics(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<String, ApiError> {
    state.metrics.render().map_err(ApiError::internal)
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(payments::router())
        .merge(reports::router())
        .route_layer(from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/ready", get(ready))
        .route("/metrics", get(render_metrics))
        .merge(protected)
        .route_layer(from_fn_with_state(state.clone(), metrics_middleware))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}
