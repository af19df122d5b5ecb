use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::services::allocation_engine::AllocationPlan;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // Counters
    pub payments_created_total: IntCounterVec,
    pub payment_allocations_total: IntCounterVec,
    pub payment_allocated_minor_total: IntCounterVec,
    pub payment_unallocated_minor_total: IntCounter,

    // Histograms
    pub http_request_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let payments_created_total = IntCounterVec::new(
            Opts::new("payments_created_total", "Payment creation attempts"),
            &["result"], // success|validation|not_found|timeout|error
        )?;

        let payment_allocations_total = IntCounterVec::new(
            Opts::new("payment_allocations_total", "Allocation rows written"),
            &["kind"], // explicit|auto
        )?;

        let payment_allocated_minor_total = IntCounterVec::new(
            Opts::new("payment_allocated_minor_total", "Allocated amount in minor units"),
            &["kind"],
        )?;

        let payment_unallocated_minor_total = IntCounter::new(
            "payment_unallocated_minor_total",
            "Payment amount left unallocated in minor units",
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration seconds"),
            &["path", "method", "status"],
        )?;

        registry.register(Box::new(payments_created_total.clone()))?;
        registry.register(Box::new(payment_allocations_total.clone()))?;
        registry.register(Box::new(payment_allocated_minor_total.clone()))?;
        registry.register(Box::new(payment_unallocated_minor_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            payments_created_total,
            payment_allocations_total,
            payment_allocated_minor_total,
            payment_unallocated_minor_total,
            http_request_duration_seconds,
        })
    }

    /// Record the allocations of a committed payment
    pub fn record_plan(&self, plan: &AllocationPlan) {
        for allocation in &plan.allocations {
            let kind = allocation.kind.as_str();
            self.payment_allocations_total.with_label_values(&[kind]).inc();
            self.payment_allocated_minor_total
                .with_label_values(&[kind])
                .inc_by(allocation.amount_minor.max(0) as u64);
        }
        self.payment_unallocated_minor_total
            .inc_by(plan.unallocated_minor.max(0) as u64);
    }

    pub fn render(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        let mut buf = Vec::new();
        encoder
            .encode(&mf, &mut buf)
            .map_err(|e| e.to_string())?;
        String::from_utf8(buf).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::allocation_engine::{AllocationKind, PlannedAllocation};

    #[test]
    fn test_record_plan_counts_by_kind() {
        let metrics = Metrics::new().unwrap();
        let plan = AllocationPlan {
            allocations: vec![
                PlannedAllocation { sales_order_id: 1, amount_minor: 500, kind: AllocationKind::Explicit },
                PlannedAllocation { sales_order_id: 2, amount_minor: 250, kind: AllocationKind::Auto },
                PlannedAllocation { sales_order_id: 3, amount_minor: 100, kind: AllocationKind::Auto },
            ],
            unallocated_minor: 75,
        };

        metrics.record_plan(&plan);

        assert_eq!(metrics.payment_allocations_total.with_label_values(&["auto"]).get(), 2);
        assert_eq!(metrics.payment_allocated_minor_total.with_label_values(&["explicit"]).get(), 500);
        assert_eq!(metrics.payment_unallocated_minor_total.get(), 75);

        let text = metrics.render().unwrap();
        assert!(text.contains("payment_allocations_total"));
    }
}
