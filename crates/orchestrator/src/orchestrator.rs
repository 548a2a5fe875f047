//! The order placement workflow.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use common::OrderId;
use domain::{AvailabilityVerdict, OrderPlacedEvent, OrderRequest, evaluate_availability};
use event_bus::EventPublisher;
use inventory::InventoryClient;
use order_store::OrderRepository;
use resilience::ResilientInventory;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::error::OrderRejection;
use crate::observer::{MetricsObserver, OrderObserver};

/// Proof that an order was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderConfirmation {
    pub order_id: OrderId,
}

/// When the placed-order notification goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishMode {
    /// Publish before `place_order` returns.
    #[default]
    Inline,
    /// Publish from a spawned task once the save has succeeded. Tasks still
    /// running are awaited by [`OrderOrchestrator::flush_pending_publishes`].
    Detached,
}

impl PublishMode {
    /// Parses `inline` or `detached`, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(PublishMode::Inline),
            "detached" => Some(PublishMode::Detached),
            _ => None,
        }
    }
}

/// Places orders: validate, check stock, save, announce.
///
/// Each call is independent. The only state shared between calls is the
/// circuit breaker inside the resilient inventory client.
pub struct OrderOrchestrator<C, R, P: ?Sized> {
    inventory: ResilientInventory<C>,
    repository: R,
    publisher: Arc<P>,
    publish_mode: PublishMode,
    observer: Arc<dyn OrderObserver>,
    pending_publishes: Mutex<JoinSet<()>>,
}

impl<C, R, P> OrderOrchestrator<C, R, P>
where
    C: InventoryClient,
    R: OrderRepository,
    P: EventPublisher + ?Sized + 'static,
{
    /// Creates an orchestrator that publishes inline and records metrics.
    pub fn new(inventory: ResilientInventory<C>, repository: R, publisher: Arc<P>) -> Self {
        Self {
            inventory,
            repository,
            publisher,
            publish_mode: PublishMode::Inline,
            observer: Arc::new(MetricsObserver),
            pending_publishes: Mutex::new(JoinSet::new()),
        }
    }

    #[must_use]
    pub fn with_publish_mode(mut self, publish_mode: PublishMode) -> Self {
        self.publish_mode = publish_mode;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn OrderObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn inventory(&self) -> &ResilientInventory<C> {
        &self.inventory
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn publish_mode(&self) -> PublishMode {
        self.publish_mode
    }

    /// Number of detached publishes not yet reaped.
    pub fn pending_publishes(&self) -> usize {
        self.lock_pending().len()
    }

    /// Waits for every detached publish still in flight.
    ///
    /// Returns how many completed; a panicked publish task is logged and
    /// not counted.
    pub async fn flush_pending_publishes(&self) -> usize {
        let mut pending = {
            let mut guard = self.lock_pending();
            std::mem::take(&mut *guard)
        };
        let mut flushed = 0;

        while let Some(result) = pending.join_next().await {
            match result {
                Ok(()) => flushed += 1,
                Err(err) => tracing::error!(error = %err, "detached publish task failed"),
            }
        }

        if flushed > 0 {
            tracing::info!(flushed, "pending order notifications flushed");
        }
        flushed
    }

    /// Places an order.
    ///
    /// Inventory is asked once per call, through the resilience policy.
    /// The order is saved only if every SKU is in stock, and the
    /// notification is published only after the save succeeded.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderRejection`] if the request is invalid, inventory
    /// fell back, some SKU is out of stock, or the save failed. In each case
    /// nothing was saved or published.
    #[tracing::instrument(
        skip(self, request),
        fields(lines = request.line_items.len(), order_id = tracing::field::Empty)
    )]
    pub async fn place_order(
        &self,
        request: OrderRequest,
    ) -> Result<OrderConfirmation, OrderRejection> {
        let started = Instant::now();

        // 1-2. Validate and build the order draft
        let order = match request.into_order() {
            Ok(order) => order,
            Err(err) => return Err(self.reject(None, OrderRejection::invalid_request(&err))),
        };
        let order_id = order.id();
        tracing::Span::current().record("order_id", tracing::field::display(order_id));
        let skus = order.distinct_skus();

        // 3. Ask inventory, once, through the resilience policy
        self.observer.before_inventory_call(order_id, skus.len());
        let inventory_started = Instant::now();
        let availability = self.inventory.check_availability(&skus).await;
        self.observer.after_inventory_call(
            order_id,
            inventory_started.elapsed(),
            availability.is_ok(),
        );

        let availability = match availability {
            Ok(availability) => availability,
            Err(fallback) => {
                self.observer.on_fallback(order_id, &fallback);
                return Err(self.reject(
                    Some(order_id),
                    OrderRejection::service_degraded(&fallback),
                ));
            }
        };

        // 4-5. Every requested SKU must be in stock
        if let AvailabilityVerdict::OutOfStock(missing) = evaluate_availability(&skus, &availability)
        {
            return Err(self.reject(Some(order_id), OrderRejection::insufficient_stock(missing)));
        }

        // 6. Persist
        if let Err(err) = self.repository.save(order).await {
            tracing::error!(error = %err, "failed to save in-stock order");
            return Err(self.reject(Some(order_id), OrderRejection::persistence_failed()));
        }

        // 7. Announce; the order stays placed whatever happens here
        let event = OrderPlacedEvent::new(order_id);
        match self.publish_mode {
            PublishMode::Inline => {
                publish(self.publisher.as_ref(), self.observer.as_ref(), event).await;
            }
            PublishMode::Detached => {
                let publisher = Arc::clone(&self.publisher);
                let observer = Arc::clone(&self.observer);
                let mut pending = self.lock_pending();
                while pending.try_join_next().is_some() {}
                pending.spawn(async move {
                    publish(publisher.as_ref(), observer.as_ref(), event).await;
                });
            }
        }

        self.observer.on_order_placed(order_id, started.elapsed());
        tracing::info!("order placed");
        Ok(OrderConfirmation { order_id })
    }

    fn lock_pending(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.pending_publishes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn reject(&self, order_id: Option<OrderId>, rejection: OrderRejection) -> OrderRejection {
        tracing::info!(
            reason = rejection.reason.code(),
            skus = ?rejection.skus,
            "order rejected"
        );
        self.observer.on_order_rejected(order_id, &rejection);
        rejection
    }
}

async fn publish<P>(publisher: &P, observer: &dyn OrderObserver, event: OrderPlacedEvent)
where
    P: EventPublisher + ?Sized,
{
    let order_id = event.order_id;
    if let Err(err) = publisher.publish(event).await {
        tracing::warn!(%order_id, error = %err, "order placed but notification failed");
        observer.on_publish_failed(order_id, &err);
    }
}
