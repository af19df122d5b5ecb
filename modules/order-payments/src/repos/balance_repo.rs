//! Repository for sales-order outstanding balances
//!
//! Outstanding = invoice-class documents − credits − allocations already
//! recorded. Balances are never stored; they are computed on demand, and
//! the allocation path computes them under row locks on the same
//! transaction that will write the allocations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

/// Outstanding balance of one sales order at snapshot time
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct OutstandingBalance {
    pub sales_order_id: i64,
    pub outstanding_minor: i64,
    pub created_at: DateTime<Utc>,
}

/// Balance snapshot keyed by sales order id
pub type BalanceSnapshot = HashMap<i64, OutstandingBalance>;

const OUTSTANDING_SELECT: &str = r#"
    SELECT so.id AS sales_order_id,
           so.created_at,
           (COALESCE(SUM(CASE
                WHEN d.doc_type IN ('Deposit Invoice', 'Sales Invoice') THEN d.amount_minor
                WHEN d.doc_type = 'Credit' THEN -d.amount_minor
                ELSE 0 END), 0)
            - COALESCE((SELECT SUM(a.amount_minor)
                        FROM allocations a
                        WHERE a.sales_order_id = so.id), 0))::BIGINT AS outstanding_minor
    FROM sales_orders so
    JOIN documents d ON d.sales_order_id = so.id
"#;

/// Lock every sales order that has at least one document
///
/// Rows are locked in ascending id order so two allocation transactions
/// always acquire locks in the same sequence. Locks are held until the
/// transaction commits or rolls back.
pub async fn lock_billable_orders_tx(
    tx: &mut Transaction<'_, Postgres>,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT so.id
        FROM sales_orders so
        WHERE EXISTS (SELECT 1 FROM documents d WHERE d.sales_order_id = so.id)
        ORDER BY so.id
        FOR UPDATE
        "#,
    )
    .fetch_all(&mut **tx)
    .await
}

/// Compute outstanding balances for the given (already locked) sales orders
pub async fn fetch_outstanding_tx(
    tx: &mut Transaction<'_, Postgres>,
    sales_order_ids: &[i64],
) -> Result<BalanceSnapshot, sqlx::Error> {
    if sales_order_ids.is_empty() {
        return Ok(BalanceSnapshot::new());
    }

    let query = format!("{OUTSTANDING_SELECT} WHERE so.id = ANY($1) GROUP BY so.id, so.created_at");
    let rows = sqlx::query_as::<_, OutstandingBalance>(&query)
        .bind(sales_order_ids)
        .fetch_all(&mut **tx)
        .await?;

    Ok(rows
        .into_iter()
        .map(|balance| (balance.sales_order_id, balance))
        .collect())
}

/// Lock billable sales orders and snapshot their balances in one step
pub async fn snapshot_for_allocation_tx(
    tx: &mut Transaction<'_, Postgres>,
) -> Result<BalanceSnapshot, sqlx::Error> {
    let locked = lock_billable_orders_tx(tx).await?;
    let snapshot = fetch_outstanding_tx(tx, &locked).await?;

    tracing::debug!(
        locked_orders = locked.len(),
        snapshot_orders = snapshot.len(),
        "Locked sales orders and computed outstanding balances"
    );

    Ok(snapshot)
}

/// Whether a sales order exists, holding a key-share lock on it if so
///
/// The lock keeps the order from being deleted before the payment that
/// references it commits.
pub async fn sales_order_exists_tx(
    tx: &mut Transaction<'_, Postgres>,
    sales_order_id: i64,
) -> Result<bool, sqlx::Error> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM sales_orders WHERE id = $1 FOR KEY SHARE",
    )
    .bind(sales_order_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(found.is_some())
}

/// Read the outstanding balance of one sales order without locking
///
/// Returns None when the order has no documents (and so no balance).
pub async fn find_outstanding(
    pool: &PgPool,
    sales_order_id: i64,
) -> Result<Option<OutstandingBalance>, sqlx::Error> {
    let query = format!("{OUTSTANDING_SELECT} WHERE so.id = $1 GROUP BY so.id, so.created_at");
    sqlx::query_as::<_, OutstandingBalance>(&query)
        .bind(sales_order_id)
        .fetch_optional(pool)
        .await
}
