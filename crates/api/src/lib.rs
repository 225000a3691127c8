//! HTTP API server for the product creation saga.
//!
//! Provides REST endpoints for creating products, inspecting their saga and
//! inventory, and updating inventory with optimistic concurrency, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::{AppState, Backend, Components, InMemoryBackend, PostgresBackend};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<K: Backend>(state: Arc<AppState<K>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health::<K>))
        .route("/products", post(routes::products::create::<K>))
        .route("/products/{id}", get(routes::products::get::<K>))
        .route("/products/{id}/saga", get(routes::products::saga_status::<K>))
        .route(
            "/products/{id}/inventory",
            get(routes::products::inventory::<K>),
        )
        .route(
            "/inventory/{id}",
            get(routes::inventory::get::<K>).put(routes::inventory::update::<K>),
        )
        .route(
            "/reconciliation/orphans",
            get(routes::reconciliation::orphans::<K>),
        )
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

/// Creates application state over in-memory stores and bus.
pub fn create_in_memory_state(config: &Config) -> Arc<AppState<InMemoryBackend>> {
    Arc::new(AppState::new(Components::in_memory(config), config))
}

/// Connects to PostgreSQL, runs migrations and creates application state.
pub async fn create_postgres_state(
    database_url: &str,
    config: &Config,
) -> Result<Arc<AppState<PostgresBackend>>, store::StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    store::run_migrations(&pool).await?;
    Ok(Arc::new(AppState::new(
        Components::postgres(pool, config),
        config,
    )))
}
