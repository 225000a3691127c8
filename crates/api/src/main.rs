//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::state::{AppState, Backend};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
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
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

fn describe_metrics() {
    metrics::describe_counter!("saga_products_created_total", "Products committed by the orchestrator");
    metrics::describe_counter!(
        "saga_publish_failures_total",
        "Committed products whose creation event could not be published"
    );
    metrics::describe_counter!("saga_compensations_total", "Products deleted by compensation");
    metrics::describe_counter!("saga_inventory_created_total", "Inventory records created by the responder");
    metrics::describe_counter!("saga_inventory_failures_total", "Failed inventory creations");
    metrics::describe_counter!("bus_messages_published_total", "Messages appended to the bus");
    metrics::describe_counter!("bus_messages_consumed_total", "Messages handed to consumer handlers");
    metrics::describe_counter!("bus_handler_errors_total", "Consumer handler failures");
    metrics::describe_histogram!(
        "saga_create_product_duration_seconds",
        metrics::Unit::Seconds,
        "Time to commit a product and publish its event"
    );
}

async fn serve<K: Backend>(state: Arc<AppState<K>>, config: &Config, metrics: PrometheusHandle) {
    state.start_background().await;

    let app = api::create_app(state.clone(), metrics);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    state.shutdown().await;
    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    describe_metrics();

    // 3. Build stores and bus once, then serve
    match config.database_url.clone() {
        Some(url) => {
            tracing::info!("using PostgreSQL backend");
            let state = api::create_postgres_state(&url, &config)
                .await
                .expect("failed to initialize PostgreSQL backend");
            serve(state, &config, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory backend");
            let state = api::create_in_memory_state(&config);
            serve(state, &config, metrics_handle).await;
        }
    }
}
