//! Payment API Routes
//!
//! - `POST /api/payments`: record a payment and allocate it
//! - `GET /api/payments`: list payments (`sales_order_id`, `from`, `to`)
//! - `GET /api/payments/{payment_id}`: fetch one payment
//! - `GET /api/sales-orders/{sales_order_id}/balance`: outstanding balance

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::contracts::{
    CreatePaymentRequestV1, PaymentListResponse, PaymentResponse, PaymentV1, SalesOrderBalanceV1,
};
use crate::repos::payment_repo::PaymentFilter;
use crate::routes::{ApiError, AppState};
use crate::services::payment_service::{self, PaymentError};
use crate::validation::parse_date;

/// Query parameters for the payment list endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ListPaymentsQuery {
    pub sales_order_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ListPaymentsQuery {
    /// Parse raw query strings; blank values count as absent
    pub fn into_filter(self) -> Result<PaymentFilter, ApiError> {
        let mut filter = PaymentFilter::default();

        if let Some(raw) = non_blank(self.sales_order_id.as_deref()) {
            let id = raw
                .parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| ApiError::bad_request("invalid sales_order_id"))?;
            filter.sales_order_id = Some(id);
        }
        if let Some(raw) = non_blank(self.from.as_deref()) {
            filter.from =
                Some(parse_date(raw).map_err(|_| ApiError::bad_request("invalid from date"))?);
        }
        if let Some(raw) = non_blank(self.to.as_deref()) {
            filter.to = Some(parse_date(raw).map_err(|_| ApiError::bad_request("invalid to date"))?);
        }

        Ok(filter)
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(e) => ApiError::bad_request(e.to_string()),
            PaymentError::NotFound(_) => ApiError::not_found(err.to_string()),
            PaymentError::Timeout(_) => {
                tracing::error!(error = %err, "request_failed");
                ApiError {
                    status: StatusCode::GATEWAY_TIMEOUT,
                    message: "payment creation timed out".to_string(),
                }
            }
            PaymentError::Database(_) => ApiError::internal(err),
        }
    }
}

fn outcome_label(err: &PaymentError) -> &'static str {
    match err {
        PaymentError::Validation(_) => "validation",
        PaymentError::NotFound(_) => "not_found",
        PaymentError::Timeout(_) => "timeout",
        PaymentError::Database(_) => "error",
    }
}

/// Handler for POST /api/payments
pub async fn create_payment(
    State(state): State<AppState>,
    payload: Result<Json<CreatePaymentRequestV1>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::bad_request("invalid JSON payload"))?;

    let created =
        match payment_service::create_payment_with_deadline(&state.pool, &req, state.payment_timeout)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                state
                    .metrics
                    .payments_created_total
                    .with_label_values(&[outcome_label(&err)])
                    .inc();
                return Err(err.into());
            }
        };

    state
        .metrics
        .payments_created_total
        .with_label_values(&["success"])
        .inc();
    state.metrics.record_plan(&created.plan);

    Ok((
        StatusCode::CREATED,
        Json(PaymentResponse {
            payment: PaymentV1::from(&created.payment),
        }),
    ))
}

/// Handler for GET /api/payments
pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<ListPaymentsQuery>,
) -> Result<Json<PaymentListResponse>, ApiError> {
    let filter = params.into_filter()?;
    let payments = payment_service::list_payments(&state.pool, &filter).await?;

    Ok(Json(PaymentListResponse {
        payments: payments.iter().map(PaymentV1::from).collect(),
    }))
}

/// Handler for GET /api/payments/{payment_id}
pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<i64>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = payment_service::get_payment(&state.pool, payment_id).await?;
    Ok(Json(PaymentResponse {
        payment: PaymentV1::from(&payment),
    }))
}

/// Handler for GET /api/sales-orders/{sales_order_id}/balance
pub async fn get_sales_order_balance(
    State(state): State<AppState>,
    Path(sales_order_id): Path<i64>,
) -> Result<Json<SalesOrderBalanceV1>, ApiError> {
    let balance = payment_service::get_outstanding_balance(&state.pool, sales_order_id)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!("sales order {sales_order_id} has no outstanding balance"))
        })?;
    Ok(Json(SalesOrderBalanceV1::from(&balance)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payments", get(list_payments).post(create_payment))
        .route("/api/payments/{payment_id}", get(get_payment))
        .route(
            "/api/sales-orders/{sales_order_id}/balance",
            get(get_sales_order_balance),
        )
}
