//! Payment reporting: KPI totals and CSV export

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::contracts::PaymentSummaryV1;
use crate::money::from_minor;
use crate::repos::report_repo::{self, PaymentExportRow};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Invalid date range: from {from} is after to {to}")]
    InvalidDateRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct PaymentCsvRecord<'a> {
    id: i64,
    sales_order_id: Option<i64>,
    date: String,
    method: &'a str,
    amount: String,
    reference: &'a str,
    created_at: String,
}

impl<'a> From<&'a PaymentExportRow> for PaymentCsvRecord<'a> {
    fn from(row: &'a PaymentExportRow) -> Self {
        Self {
            id: row.id,
            sales_order_id: row.sales_order_id,
            date: row.date.to_rfc3339_opts(SecondsFormat::Secs, true),
            method: &row.method,
            amount: format!("{:.2}", from_minor(row.amount_minor)),
            reference: &row.reference,
            created_at: row.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Total and count of payments dated within the inclusive range
pub async fn payment_summary(
    pool: &PgPool,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<PaymentSummaryV1, ReportError> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ReportError::InvalidDateRange { from, to });
        }
    }

    let totals = report_repo::payment_totals(pool, from, to).await?;

    Ok(PaymentSummaryV1 {
        payments_total: from_minor(totals.total_minor),
        payment_count: totals.payment_count,
    })
}

/// Export every payment as CSV, newest first
pub async fn export_payments_csv(pool: &PgPool) -> Result<Vec<u8>, ReportError> {
    let rows = report_repo::payments_for_export(pool).await?;
    let data = encode_payments_csv(&rows)?;

    tracing::info!(rows = rows.len(), bytes = data.len(), "Exported payments CSV");

    Ok(data)
}

/// Encode payment rows as CSV with a header line
pub fn encode_payments_csv(rows: &[PaymentExportRow]) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record([
        "id",
        "sales_order_id",
        "date",
        "method",
        "amount",
        "reference",
        "created_at",
    ])?;
    for row in rows {
        writer.serialize(PaymentCsvRecord::from(row))?;
    }

    writer
        .into_inner()
        .map_err(|e| ReportError::Csv(e.into_error().into()))
}
