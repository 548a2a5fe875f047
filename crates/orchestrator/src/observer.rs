//! Instrumentation hooks around order placement.

use std::time::Duration;

use common::OrderId;
use event_bus::PublishError;
use resilience::Fallback;

use crate::error::OrderRejection;

/// Callbacks invoked at fixed points of `place_order`.
///
/// Every method defaults to doing nothing. Implementations must be cheap
/// and must not fail; they run inline with the request.
pub trait OrderObserver: Send + Sync {
    fn before_inventory_call(&self, _order_id: OrderId, _sku_count: usize) {}

    fn after_inventory_call(&self, _order_id: OrderId, _elapsed: Duration, _succeeded: bool) {}

    fn on_fallback(&self, _order_id: OrderId, _fallback: &Fallback) {}

    fn on_order_placed(&self, _order_id: OrderId, _elapsed: Duration) {}

    /// `order_id` is `None` when the request never became an order.
    fn on_order_rejected(&self, _order_id: Option<OrderId>, _rejection: &OrderRejection) {}

    fn on_publish_failed(&self, _order_id: OrderId, _error: &PublishError) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl OrderObserver for NoopObserver {}

/// Observer that records Prometheus metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl OrderObserver for MetricsObserver {
    fn after_inventory_call(&self, _order_id: OrderId, elapsed: Duration, succeeded: bool) {
        let outcome = if succeeded { "ok" } else { "fallback" };
        metrics::counter!("order_inventory_checks_total", "outcome" => outcome).increment(1);
        metrics::histogram!("order_inventory_check_duration_seconds")
            .record(elapsed.as_secs_f64());
    }

    fn on_fallback(&self, _order_id: OrderId, fallback: &Fallback) {
        metrics::counter!("orders_degraded_total", "cause" => fallback.cause.as_str()).increment(1);
    }

    fn on_order_placed(&self, _order_id: OrderId, elapsed: Duration) {
        metrics::counter!("orders_placed_total").increment(1);
        metrics::histogram!("order_placement_duration_seconds").record(elapsed.as_secs_f64());
    }

    fn on_order_rejected(&self, _order_id: Option<OrderId>, rejection: &OrderRejection) {
        metrics::counter!("orders_rejected_total", "reason" => rejection.reason.code())
            .increment(1);
    }

    fn on_publish_failed(&self, _order_id: OrderId, _error: &PublishError) {
        metrics::counter!("order_publish_failures_total").increment(1);
    }
}
