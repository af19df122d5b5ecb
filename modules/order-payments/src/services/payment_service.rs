//! Payment business logic service
//!
//! Owns the transaction boundary for payment creation: lock and snapshot
//! balances, plan allocations, write the payment and its allocation rows,
//! commit. Dropping the transaction on any early return rolls it back, so a
//! failed creation never leaves a payment or allocation row behind.

use std::time::Duration;

use sqlx::{PgPool, Postgres, Transaction};

use crate::contracts::CreatePaymentRequestV1;
use crate::repos::balance_repo::{self, OutstandingBalance};
use crate::repos::payment_repo::{self, Payment, PaymentFilter};
use crate::services::allocation_engine::{self, AllocationPlan};
use crate::validation::{normalize_create_request, NewPayment, ValidationError};

/// Errors that can occur during payment operations
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Payment not found: {0}")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Payment creation exceeded deadline of {0:?}")]
    Timeout(Duration),
}

/// Result type for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;

/// A committed payment together with the plan that produced its allocations
#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub payment: Payment,
    pub plan: AllocationPlan,
}

/// Payment and allocation rows written but not yet committed
struct StagedPayment {
    tx: Transaction<'static, Postgres>,
    payment_id: i64,
    amount_minor: i64,
    plan: AllocationPlan,
}

/// Record a payment and allocate it against outstanding sales-order balances
///
/// This function:
/// 1. Validates and normalizes the request (no transaction yet)
/// 2. Locks billable sales orders and snapshots their balances
/// 3. Resolves explicit allocations, then auto-allocates the remainder
/// 4. Inserts the payment and every non-zero allocation
/// 5. Commits and reloads the payment
pub async fn create_payment(
    pool: &PgPool,
    req: &CreatePaymentRequestV1,
) -> PaymentResult<CreatedPayment> {
    let new_payment = normalize_create_request(req)?;
    let staged = stage_payment(pool, &new_payment).await?;
    commit_and_reload(pool, staged).await
}

/// Same as `create_payment`, with the uncommitted part bounded by `deadline`
///
/// On expiry the in-flight transaction is dropped, which rolls it back. Once
/// the rows are staged the commit and reload run to completion, so a payment
/// that was stored is never reported as timed out.
pub async fn create_payment_with_deadline(
    pool: &PgPool,
    req: &CreatePaymentRequestV1,
    deadline: Duration,
) -> PaymentResult<CreatedPayment> {
    let new_payment = normalize_create_request(req)?;

    let staged = match tokio::time::timeout(deadline, stage_payment(pool, &new_payment)).await {
        Ok(staged) => staged?,
        Err(_) => {
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Payment creation timed out");
            return Err(PaymentError::Timeout(deadline));
        }
    };

    commit_and_reload(pool, staged).await
}

/// Lock, snapshot, plan and insert inside a fresh transaction
async fn stage_payment(pool: &PgPool, new_payment: &NewPayment) -> PaymentResult<StagedPayment> {
    let mut tx = pool.begin().await?;

    let mut snapshot = balance_repo::snapshot_for_allocation_tx(&mut tx).await?;

    let plan = allocation_engine::plan_allocations(
        new_payment.amount_minor,
        &new_payment.allocations,
        &mut snapshot,
    )?;

    if let Some(anchor) = new_payment.sales_order_id {
        if !balance_repo::sales_order_exists_tx(&mut tx, anchor).await? {
            return Err(ValidationError::UnknownSalesOrder(anchor).into());
        }
    }

    let payment_id = payment_repo::insert_payment_tx(
        &mut tx,
        new_payment.sales_order_id,
        new_payment.date,
        &new_payment.method,
        new_payment.amount_minor,
        &new_payment.reference,
    )
    .await?;

    for allocation in plan.allocations.iter().filter(|a| a.amount_minor > 0) {
        payment_repo::insert_allocation_tx(
            &mut tx,
            payment_id,
            allocation.sales_order_id,
            allocation.amount_minor,
        )
        .await?;
    }

    Ok(StagedPayment {
        tx,
        payment_id,
        amount_minor: new_payment.amount_minor,
        plan,
    })
}

async fn commit_and_reload(pool: &PgPool, staged: StagedPayment) -> PaymentResult<CreatedPayment> {
    let StagedPayment {
        tx,
        payment_id,
        amount_minor,
        plan,
    } = staged;

    tx.commit().await?;

    if plan.unallocated_minor > 0 {
        tracing::info!(
            payment_id = payment_id,
            unallocated_minor = plan.unallocated_minor,
            "Payment exceeds total outstanding balance; remainder left unallocated"
        );
    }

    tracing::info!(
        payment_id = payment_id,
        amount_minor = amount_minor,
        allocation_count = plan.allocations.len(),
        allocated_minor = plan.allocated_minor(),
        "Payment created successfully"
    );

    let payment = payment_repo::fetch_payment(pool, payment_id)
        .await?
        .ok_or(PaymentError::NotFound(payment_id))?;

    Ok(CreatedPayment { payment, plan })
}

/// Fetch a payment by id
pub async fn get_payment(pool: &PgPool, payment_id: i64) -> PaymentResult<Payment> {
    payment_repo::fetch_payment(pool, payment_id)
        .await?
        .ok_or(PaymentError::NotFound(payment_id))
}

/// List payments matching the filter, newest first
pub async fn list_payments(pool: &PgPool, filter: &PaymentFilter) -> PaymentResult<Vec<Payment>> {
    Ok(payment_repo::list_payments(pool, filter).await?)
}

/// Current outstanding balance of one sales order (unlocked read)
///
/// None means the order has no documents and therefore nothing to allocate.
pub async fn get_outstanding_balance(
    pool: &PgPool,
    sales_order_id: i64,
) -> PaymentResult<Option<OutstandingBalance>> {
    Ok(balance_repo::find_outstanding(pool, sales_order_id).await?)
}
