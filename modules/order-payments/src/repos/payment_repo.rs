use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};

/// Maximum number of payments returned by a list query
pub const LIST_LIMIT: i64 = 200;

/// Payment row with its allocations loaded
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Payment {
    pub id: i64,
    pub sales_order_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub method: String,
    pub amount_minor: i64,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub allocations: Vec<Allocation>,
}

/// Allocation row
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Allocation {
    pub id: i64,
    pub payment_id: i64,
    pub sales_order_id: i64,
    pub amount_minor: i64,
}

/// Filters for listing payments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFilter {
    /// Matches the anchor sales order or any allocation against it
    pub sales_order_id: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Insert a payment header and return its id
pub async fn insert_payment_tx(
    tx: &mut Transaction<'_, Postgres>,
    sales_order_id: Option<i64>,
    date: DateTime<Utc>,
    method: &str,
    amount_minor: i64,
    reference: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO payments (sales_order_id, date, method, amount_minor, reference)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(sales_order_id)
    .bind(date)
    .bind(method)
    .bind(amount_minor)
    .bind(reference)
    .fetch_one(&mut **tx)
    .await
}

/// Insert one allocation row
pub async fn insert_allocation_tx(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: i64,
    sales_order_id: i64,
    amount_minor: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO allocations (payment_id, sales_order_id, amount_minor)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(payment_id)
    .bind(sales_order_id)
    .bind(amount_minor)
    .fetch_one(&mut **tx)
    .await
}

/// Fetch a payment by id with its allocations
pub async fn fetch_payment(pool: &PgPool, payment_id: i64) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, sales_order_id, date, method, amount_minor, reference, created_at
        FROM payments
        WHERE id = $1
        "#,
    )
    .bind(payment_id)
    .fetch_optional(pool)
    .await?;

    let Some(mut payment) = payment else {
        return Ok(None);
    };

    let mut allocations = fetch_allocations(pool, &[payment_id]).await?;
    payment.allocations = allocations.remove(&payment_id).unwrap_or_default();

    Ok(Some(payment))
}

/// List payments newest first, at most `LIST_LIMIT` rows
pub async fn list_payments(
    pool: &PgPool,
    filter: &PaymentFilter,
) -> Result<Vec<Payment>, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, sales_order_id, date, method, amount_minor, reference, created_at FROM payments WHERE TRUE",
    );

    if let Some(sales_order_id) = filter.sales_order_id {
        qb.push(" AND (sales_order_id = ")
            .push_bind(sales_order_id)
            .push(" OR id IN (SELECT payment_id FROM allocations WHERE sales_order_id = ")
            .push_bind(sales_order_id)
            .push("))");
    }
    if let Some(from) = filter.from {
        qb.push(" AND date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND date <= ").push_bind(to);
    }
    qb.push(" ORDER BY date DESC, id DESC LIMIT ").push_bind(LIST_LIMIT);

    let mut payments = qb.build_query_as::<Payment>().fetch_all(pool).await?;
    if payments.is_empty() {
        return Ok(payments);
    }

    let ids: Vec<i64> = payments.iter().map(|p| p.id).collect();
    let mut allocations = fetch_allocations(pool, &ids).await?;
    for payment in &mut payments {
        payment.allocations = allocations.remove(&payment.id).unwrap_or_default();
    }

    Ok(payments)
}

/// Fetch allocations for a set of payments, grouped by payment id, id ascending
pub async fn fetch_allocations(
    pool: &PgPool,
    payment_ids: &[i64],
) -> Result<HashMap<i64, Vec<Allocation>>, sqlx::Error> {
    if payment_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, Allocation>(
        r#"
        SELECT id, payment_id, sales_order_id, amount_minor
        FROM allocations
        WHERE payment_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(payment_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<i64, Vec<Allocation>> = HashMap::new();
    for row in rows {
        grouped.entry(row.payment_id).or_default().push(row);
    }

    Ok(grouped)
}
