//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use event_bus::{BroadcastEventPublisher, EventPublisher, spawn_notification_listener};
use inventory::{HttpInventoryClient, InventoryClient};
use order_store::{InMemoryOrderRepository, OrderRepository, PostgresOrderRepository};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn open_repository(
    config: &Config,
) -> Result<Arc<dyn OrderRepository>, order_store::PersistenceError> {
    match &config.database_url {
        Some(url) => {
            let repository = PostgresOrderRepository::connect(url).await?;
            repository.run_migrations().await?;
            tracing::info!("orders are stored in PostgreSQL");
            Ok(Arc::new(repository))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory");
            Ok(Arc::new(InMemoryOrderRepository::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Wire collaborators
    let inventory: Arc<dyn InventoryClient> = Arc::new(HttpInventoryClient::new(
        config.inventory_url.clone(),
        config.resilience.timeout,
    )?);
    let repository = open_repository(&config).await?;

    let topic = BroadcastEventPublisher::default();
    let listener = spawn_notification_listener(topic.subscribe());
    let publisher: Arc<dyn EventPublisher> = Arc::new(topic);

    // 4. Build the application
    let state = api::create_state(&config, inventory, repository, publisher);
    let app = api::create_app(Arc::clone(&state), metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(
        %addr,
        inventory_url = %config.inventory_url,
        publish_mode = ?config.publish_mode,
        "starting order service"
    );

    let tcp = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. Finish detached notifications, then close the topic
    state.orchestrator.flush_pending_publishes().await;
    drop(state);
    let notifications = listener.await?;
    tracing::info!(notifications, "server shut down gracefully");
    Ok(())
}
