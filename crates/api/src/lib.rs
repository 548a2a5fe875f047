//! HTTP API server with observability for order placement.
//!
//! Exposes the order placement workflow over REST, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_bus::EventPublisher;
use inventory::InventoryClient;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::OrderOrchestrator;
use order_store::OrderRepository;
use resilience::ResilientInventory;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// The orchestrator as wired by the server.
pub type Orchestrator = OrderOrchestrator<
    Arc<dyn InventoryClient>,
    Arc<dyn OrderRepository>,
    dyn EventPublisher,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/api/order", post(routes::orders::place))
        .route("/api/order/{id}", get(routes::orders::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the orchestrator from its collaborators and the configured policy.
pub fn create_state(
    config: &Config,
    inventory: Arc<dyn InventoryClient>,
    repository: Arc<dyn OrderRepository>,
    publisher: Arc<dyn EventPublisher>,
) -> Arc<AppState> {
    let orchestrator = OrderOrchestrator::new(
        ResilientInventory::new(inventory, &config.resilience),
        repository,
        publisher,
    )
    .with_publish_mode(config.publish_mode);

    Arc::new(AppState { orchestrator })
}
