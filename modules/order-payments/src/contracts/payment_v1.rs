//! Payment API V1 contract types
//!
//! Wire amounts are decimal currency values; everything behind the contract
//! layer works in minor units.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::from_minor;
use crate::repos::balance_repo::OutstandingBalance;
use crate::repos::payment_repo::{Allocation, Payment};

/// Body of `POST /api/payments`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreatePaymentRequestV1 {
    /// Optional anchor sales order (non-positive values are treated as absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_order_id: Option<i64>,

    /// RFC-3339 instant or `YYYY-MM-DD`; defaults to now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub amount: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Caller-specified allocations, applied before the automatic sweep
    #[serde(default)]
    pub allocations: Vec<AllocationRequestV1>,
}

/// One caller-specified allocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AllocationRequestV1 {
    pub sales_order_id: i64,
    pub amount: f64,
}

/// Payment as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentV1 {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_order_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub method: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub allocations: Vec<AllocationV1>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationV1 {
    pub id: i64,
    pub payment_id: i64,
    pub sales_order_id: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentResponse {
    pub payment: PaymentV1,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentV1>,
}

/// Outstanding balance of a single sales order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesOrderBalanceV1 {
    pub sales_order_id: i64,
    pub outstanding: f64,
    pub created_at: DateTime<Utc>,
}

/// Payments KPI over an optional date range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentSummaryV1 {
    pub payments_total: f64,
    pub payment_count: i64,
}

impl From<&Allocation> for AllocationV1 {
    fn from(allocation: &Allocation) -> Self {
        Self {
            id: allocation.id,
            payment_id: allocation.payment_id,
            sales_order_id: allocation.sales_order_id,
            amount: from_minor(allocation.amount_minor),
        }
    }
}

impl From<&Payment> for PaymentV1 {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            sales_order_id: payment.sales_order_id,
            date: payment.date,
            method: payment.method.clone(),
            amount: from_minor(payment.amount_minor),
            reference: payment.reference.clone(),
            created_at: payment.created_at,
            allocations: payment.allocations.iter().map(AllocationV1::from).collect(),
        }
    }
}

impl From<&OutstandingBalance> for SalesOrderBalanceV1 {
    fn from(balance: &OutstandingBalance) -> Self {
        Self {
            sales_order_id: balance.sales_order_id,
            outstanding: from_minor(balance.outstanding_minor),
            created_at: balance.created_at,
        }
    }
}
