use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::contracts::PaymentSummaryV1;
use crate::routes::payments::non_blank;
use crate::routes::{ApiError, AppState};
use crate::services::payment_report_service::{self, ReportError};
use crate::validation::parse_date;

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidDateRange { .. } => ApiError::bad_request(err.to_string()),
            ReportError::Database(_) | ReportError::Csv(_) => ApiError::internal(err),
        }
    }
}

/// Handler for GET /api/reports/payments/summary
pub async fn payment_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryQuery>,
) -> Result<Json<PaymentSummaryV1>, ApiError> {
    let from = non_blank(params.from.as_deref())
        .map(parse_date)
        .transpose()
        .map_err(|_| ApiError::bad_request("invalid from date"))?;
    let to = non_blank(params.to.as_deref())
        .map(parse_date)
        .transpose()
        .map_err(|_| ApiError::bad_request("invalid to date"))?;

    let summary = payment_report_service::payment_summary(&state.pool, from, to).await?;
    Ok(Json(summary))
}

/// Handler for GET /api/reports/export/payments
pub async fn export_payments(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let data = payment_report_service::export_payments_csv(&state.pool).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=payments.csv"),
        ],
        data,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/reports/payments/summary", get(payment_summary))
        .route("/api/reports/export/payments", get(export_payments))
}
