//! Payment allocation engine
//!
//! Pure functions over a balance snapshot taken inside the payment
//! transaction:
//!
//! 1. `resolve_explicit` checks caller-specified allocations against the
//!    snapshot and draws them down.
//! 2. `auto_allocate` sweeps whatever is left of the payment across the
//!    remaining balances, oldest sales order first.
//!
//! All amounts are minor units, so "nothing left" is exactly zero.

use crate::repos::balance_repo::{BalanceSnapshot, OutstandingBalance};
use crate::validation::{AllocationInput, ValidationError};

/// Where an allocation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationKind {
    Explicit,
    Auto,
}

impl AllocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Auto => "auto",
        }
    }
}

/// An allocation decided by the engine, not yet persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedAllocation {
    pub sales_order_id: i64,
    pub amount_minor: i64,
    pub kind: AllocationKind,
}

/// Validated explicit allocations and their total
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExplicit {
    pub allocations: Vec<PlannedAllocation>,
    pub total_minor: i64,
}

/// Full allocation outcome for one payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    /// Explicit allocations in input order, then automatic ones oldest first
    pub allocations: Vec<PlannedAllocation>,
    /// Part of the payment no outstanding balance could absorb
    pub unallocated_minor: i64,
}

impl AllocationPlan {
    pub fn allocated_minor(&self) -> i64 {
        self.allocations.iter().map(|a| a.amount_minor).sum()
    }
}

/// Validate explicit allocations and decrement the working balances
///
/// Entries are applied in order, so a second entry for the same sales order
/// sees the balance left by the first.
pub fn resolve_explicit(
    inputs: &[AllocationInput],
    snapshot: &mut BalanceSnapshot,
) -> Result<ResolvedExplicit, ValidationError> {
    let mut allocations = Vec::with_capacity(inputs.len());
    let mut total_minor = 0i64;

    for input in inputs {
        let balance = snapshot
            .get_mut(&input.sales_order_id)
            .ok_or(ValidationError::NoOutstandingBalance(input.sales_order_id))?;

        if input.amount_minor > balance.outstanding_minor {
            return Err(ValidationError::AllocationExceedsOutstanding {
                sales_order_id: input.sales_order_id,
                requested_minor: input.amount_minor,
                outstanding_minor: balance.outstanding_minor,
            });
        }

        balance.outstanding_minor -= input.amount_minor;
        total_minor += input.amount_minor;
        allocations.push(PlannedAllocation {
            sales_order_id: input.sales_order_id,
            amount_minor: input.amount_minor,
            kind: AllocationKind::Explicit,
        });
    }

    Ok(ResolvedExplicit {
        allocations,
        total_minor,
    })
}

/// Distribute `remaining_minor` across outstanding balances, oldest first
///
/// Candidates are ordered by (created_at, sales_order_id); the id makes the
/// order total so equal timestamps always allocate in the same sequence.
/// Balances are drawn down as they are allocated. Whatever cannot be placed
/// is simply left over.
pub fn auto_allocate(
    remaining_minor: i64,
    snapshot: &mut BalanceSnapshot,
) -> Vec<PlannedAllocation> {
    let mut remaining = remaining_minor;
    if remaining <= 0 {
        return Vec::new();
    }

    let mut candidates: Vec<&mut OutstandingBalance> = snapshot
        .values_mut()
        .filter(|balance| balance.outstanding_minor > 0)
        .collect();
    candidates.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then(a.sales_order_id.cmp(&b.sales_order_id))
    });

    let mut allocations = Vec::new();
    for candidate in candidates {
        if remaining <= 0 {
            break;
        }
        let amount_minor = candidate.outstanding_minor.min(remaining);
        if amount_minor <= 0 {
            continue;
        }
        candidate.outstanding_minor -= amount_minor;
        remaining -= amount_minor;
        allocations.push(PlannedAllocation {
            sales_order_id: candidate.sales_order_id,
            amount_minor,
            kind: AllocationKind::Auto,
        });
    }

    allocations
}

/// Resolve explicit allocations, then sweep the remainder automatically
pub fn plan_allocations(
    amount_minor: i64,
    explicit: &[AllocationInput],
    snapshot: &mut BalanceSnapshot,
) -> Result<AllocationPlan, ValidationError> {
    let resolved = resolve_explicit(explicit, snapshot)?;

    let remaining_minor = amount_minor - resolved.total_minor;
    if remaining_minor < 0 {
        return Err(ValidationError::AllocationsExceedPayment {
            allocated_minor: resolved.total_minor,
            amount_minor,
        });
    }

    let automatic = auto_allocate(remaining_minor, snapshot);
    let auto_total: i64 = automatic.iter().map(|a| a.amount_minor).sum();

    let mut allocations = resolved.allocations;
    allocations.extend(automatic);

    Ok(AllocationPlan {
        allocations,
        unallocated_minor: remaining_minor - auto_total,
    })
}
