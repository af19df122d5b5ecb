//! Validation logic for payment creation requests
//!
//! Normalizes a `CreatePaymentRequestV1` into a `NewPayment` with trimmed text,
//! a concrete UTC date and amounts converted to minor units. Every rule here
//! runs before a transaction is opened.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::contracts::CreatePaymentRequestV1;
use crate::money::{to_minor, MAX_AMOUNT_MINOR};

/// Validation errors for payment creation
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("method is required")]
    MissingMethod,

    #[error("amount must be positive, got {0}")]
    AmountNotPositive(f64),

    #[error("amount {0} exceeds the maximum of {max}", max = MAX_AMOUNT_MINOR / 100)]
    AmountTooLarge(f64),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("allocation {0}: sales_order_id required")]
    AllocationMissingSalesOrder(usize),

    #[error("allocation {0}: amount must be positive, got {1}")]
    AllocationAmountNotPositive(usize, f64),

    #[error("allocation {0}: amount {1} exceeds the maximum of {max}", max = MAX_AMOUNT_MINOR / 100)]
    AllocationAmountTooLarge(usize, f64),

    #[error("sales order {0} does not exist")]
    UnknownSalesOrder(i64),

    #[error("sales order {0} has no outstanding balance")]
    NoOutstandingBalance(i64),

    #[error("allocation of {requested_minor} minor units exceeds outstanding {outstanding_minor} for order {sales_order_id}")]
    AllocationExceedsOutstanding {
        sales_order_id: i64,
        requested_minor: i64,
        outstanding_minor: i64,
    },

    #[error("allocations exceed payment amount ({allocated_minor} > {amount_minor} minor units)")]
    AllocationsExceedPayment {
        allocated_minor: i64,
        amount_minor: i64,
    },
}

/// A caller-specified allocation after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationInput {
    pub sales_order_id: i64,
    pub amount_minor: i64,
}

/// Sanitized payment fields ready for the allocation transaction
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub sales_order_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub method: String,
    pub amount_minor: i64,
    pub reference: String,
    pub allocations: Vec<AllocationInput>,
}

/// Validate and normalize a payment creation request
///
/// # Validation Rules
///
/// - `method`: trimmed, must be non-empty
/// - `amount`: must be positive after rounding to the cent
/// - `date`: RFC-3339 or `YYYY-MM-DD`; blank or absent means now (UTC)
/// - `reference`: trimmed, absent becomes empty
/// - `sales_order_id`: kept only when positive
/// - each allocation: positive `sales_order_id`, positive amount after rounding
pub fn normalize_create_request(
    req: &CreatePaymentRequestV1,
) -> Result<NewPayment, ValidationError> {
    let method = req.method.trim();
    if method.is_empty() {
        return Err(ValidationError::MissingMethod);
    }

    let amount_minor = positive_minor(req.amount).map_err(|fault| match fault {
        AmountFault::NotPositive => ValidationError::AmountNotPositive(req.amount),
        AmountFault::TooLarge => ValidationError::AmountTooLarge(req.amount),
    })?;

    let date = match req.date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_date(raw)?,
        _ => Utc::now(),
    };

    let reference = req
        .reference
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let mut allocations = Vec::with_capacity(req.allocations.len());
    for (idx, alloc) in req.allocations.iter().enumerate() {
        if alloc.sales_order_id <= 0 {
            return Err(ValidationError::AllocationMissingSalesOrder(idx));
        }
        let amount_minor = positive_minor(alloc.amount).map_err(|fault| match fault {
            AmountFault::NotPositive => {
                ValidationError::AllocationAmountNotPositive(idx, alloc.amount)
            }
            AmountFault::TooLarge => ValidationError::AllocationAmountTooLarge(idx, alloc.amount),
        })?;
        allocations.push(AllocationInput {
            sales_order_id: alloc.sales_order_id,
            amount_minor,
        });
    }

    Ok(NewPayment {
        sales_order_id: req.sales_order_id.filter(|id| *id > 0),
        date,
        method: method.to_string(),
        amount_minor,
        reference,
        allocations,
    })
}

/// Parse an RFC-3339 instant or a `YYYY-MM-DD` date (midnight UTC)
pub fn parse_date(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ValidationError::InvalidDate(trimmed.to_string()))
}

enum AmountFault {
    NotPositive,
    TooLarge,
}

/// Minor units of a positive amount no larger than `MAX_AMOUNT_MINOR`
fn positive_minor(value: f64) -> Result<i64, AmountFault> {
    if value.is_nan() {
        return Err(AmountFault::NotPositive);
    }
    if value > (MAX_AMOUNT_MINOR / 100) as f64 {
        return Err(AmountFault::TooLarge);
    }
    let minor = to_minor(value);
    if minor <= 0 {
        return Err(AmountFault::NotPositive);
    }
    if minor > MAX_AMOUNT_MINOR {
        return Err(AmountFault::TooLarge);
    }
    Ok(minor)
}
