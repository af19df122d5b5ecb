//! Read-only queries backing payment reports
//!
//! Reporting reads persisted payments directly; it never touches the
//! allocation path.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

/// Aggregate of payments over a date range
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PaymentTotals {
    pub total_minor: i64,
    pub payment_count: i64,
}

/// One exported payment row (allocations are not part of the export)
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PaymentExportRow {
    pub id: i64,
    pub sales_order_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub method: String,
    pub amount_minor: i64,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Sum payment amounts with inclusive optional bounds
pub async fn payment_totals(
    pool: &PgPool,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<PaymentTotals, sqlx::Error> {
    sqlx::query_as::<_, PaymentTotals>(
        r#"
        SELECT COALESCE(SUM(amount_minor), 0)::BIGINT AS total_minor,
               COUNT(*) AS payment_count
        FROM payments
        WHERE ($1::TIMESTAMPTZ IS NULL OR date >= $1)
          AND ($2::TIMESTAMPTZ IS NULL OR date <= $2)
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await
}

/// All payments, newest first
pub async fn payments_for_export(pool: &PgPool) -> Result<Vec<PaymentExportRow>, sqlx::Error> {
    sqlx::query_as::<_, PaymentExportRow>(
        r#"
        SELECT id, sales_order_id, date, method, amount_minor, reference, created_at
        FROM payments
        ORDER BY date DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await
}
