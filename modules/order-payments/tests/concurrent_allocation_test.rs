//! Concurrency tests for payment allocation
//!
//! Many payments race for the same outstanding balances. Row locks taken
//! before the balance snapshot must keep every sales order at or under its
//! invoiced total and every payment at or under its own amount.

mod common;

use std::time::Duration;

use common::{
    allocated_to_order, at, count_rows, database_url, get_test_pool, insert_customer,
    invoiced_order, reset_database,
};
use futures::future::join_all;
use order_payments_rs::contracts::{AllocationRequestV1, CreatePaymentRequestV1};
use order_payments_rs::services::payment_service::{
    create_payment, create_payment_with_deadline, PaymentError,
};
use serial_test::serial;
use sqlx::postgres::PgPoolOptions;

fn payment(amount: f64) -> CreatePaymentRequestV1 {
    CreatePaymentRequestV1 {
        method: "cash".to_string(),
        amount,
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_auto_allocations_never_over_allocate() {
    let pool = get_test_pool().await;
    reset_database(&pool).await;

    let customer = insert_customer(&pool, "Kite Diamonds").await;
    let invoiced = [(at(2024, 1, 1), 10_000), (at(2024, 1, 2), 7_500), (at(2024, 1, 3), 2_500)];
    let mut orders = Vec::new();
    for (created_at, minor) in invoiced {
        orders.push((invoiced_order(&pool, customer, created_at, minor).await, minor));
    }

    // 12 × 30.00 = 360.00 against 200.00 outstanding
    let tasks = (0..12).map(|_| {
        let pool = pool.clone();
        tokio::spawn(async move { create_payment(&pool, &payment(30.0)).await })
    });
    let results = join_all(tasks).await;

    let mut total_allocated = 0;
    for result in results {
        let created = result.expect("task panicked").expect("payment failed");
        let allocated: i64 = created
            .payment
            .allocations
            .iter()
            .map(|a| a.amount_minor)
            .sum();
        assert!(allocated <= created.payment.amount_minor);
        total_allocated += allocated;
    }

    for (so, invoiced_minor) in &orders {
        let allocated = allocated_to_order(&pool, *so).await;
        assert_eq!(allocated, *invoiced_minor, "order {so} should be exactly settled");
    }
    assert_eq!(total_allocated, 20_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_explicit_allocations_one_wins() {
    let pool = get_test_pool().await;
    reset_database(&pool).await;

    let customer = insert_customer(&pool, "Lustre Ltd").await;
    let so = invoiced_order(&pool, customer, at(2024, 1, 1), 10_000).await;

    let tasks = (0..6).map(|_| {
        let pool = pool.clone();
        tokio::spawn(async move {
            let mut req = payment(80.0);
            req.allocations = vec![AllocationRequestV1 {
                sales_order_id: so,
                amount: 80.0,
            }];
            create_payment(&pool, &req).await
        })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(PaymentError::Validation(_))))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(rejected, 5);
    assert_eq!(allocated_to_order(&pool, so).await, 8_000);
}

#[tokio::test]
#[serial]
async fn test_deadline_expiry_rolls_back() {
    let pool = get_test_pool().await;
    reset_database(&pool).await;

    let customer = insert_customer(&pool, "Marquise Inc").await;
    invoiced_order(&pool, customer, at(2024, 1, 1), 10_000).await;

    // Hold the sales-order row lock so the payment cannot take its snapshot
    let mut blocker = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM sales_orders FOR UPDATE")
        .fetch_all(&mut *blocker)
        .await
        .unwrap();

    let err = create_payment_with_deadline(&pool, &payment(10.0), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Timeout(_)));

    blocker.rollback().await.unwrap();

    let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(payments, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_committed_payment_not_reported_as_timeout() {
    let pool = get_test_pool().await;
    reset_database(&pool).await;

    let customer = insert_customer(&pool, "Nacre Goods").await;
    let so = invoiced_order(&pool, customer, at(2024, 1, 1), 10_000).await;

    // One connection: whoever queues for it first after the commit gets it
    let single = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&database_url())
        .await
        .unwrap();

    let mut blocker = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM sales_orders FOR UPDATE")
        .fetch_all(&mut *blocker)
        .await
        .unwrap();

    let creator = {
        let single = single.clone();
        tokio::spawn(async move {
            create_payment_with_deadline(&single, &payment(25.0), Duration::from_millis(400)).await
        })
    };

    // The payment now holds the only connection, waiting on the row lock.
    // Queue behind it and keep the connection well past the deadline so the
    // reload after the commit has to wait.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let holder = {
        let single = single.clone();
        tokio::spawn(async move {
            let conn = single.acquire().await.unwrap();
            tokio::time::sleep(Duration::from_millis(700)).await;
            drop(conn);
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    blocker.rollback().await.unwrap();

    let created = creator
        .await
        .expect("task panicked")
        .expect("committed payment reported as failure");
    holder.await.unwrap();

    assert_eq!(created.payment.amount_minor, 2_500);
    assert_eq!(count_rows(&pool, "payments").await, 1);
    assert_eq!(allocated_to_order(&pool, so).await, 2_500);
}
