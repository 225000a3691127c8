//! Product creation and saga inspection endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::ProductId;
use domain::{CreateProduct, Inventory, Product};
use saga::{SagaJournal, SagaState, SagaTransition};
use serde::Serialize;

use super::parse_id;
use crate::error::ApiError;
use crate::state::{AppState, Backend};

#[derive(Serialize)]
pub struct SagaStatusResponse {
    pub product_id: ProductId,
    pub state: SagaState,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<SagaTransition>,
}

/// POST /products — create a product and start its saga.
#[tracing::instrument(skip(state, req))]
pub async fn create<K: Backend>(
    State(state): State<Arc<AppState<K>>>,
    Json(req): Json<CreateProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.orchestrator.create_product(req).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/{id} — load a product.
#[tracing::instrument(skip(state))]
pub async fn get<K: Backend>(
    State(state): State<Arc<AppState<K>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    Ok(Json(state.orchestrator.products().get(product_id).await?))
}

/// GET /products/{id}/saga — current saga state and its transitions.
#[tracing::instrument(skip(state))]
pub async fn saga_status<K: Backend>(
    State(state): State<Arc<AppState<K>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    let journal = state.orchestrator.journal();

    let record = journal
        .current(product_id)
        .await
        .map_err(saga::SagaError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("No saga for product {id}")))?;
    let history = journal
        .history(product_id)
        .await
        .map_err(saga::SagaError::from)?;

    Ok(Json(SagaStatusResponse {
        product_id,
        state: record.state,
        updated_at: record.updated_at,
        history,
    }))
}

/// GET /products/{id}/inventory — inventory records of a product.
#[tracing::instrument(skip(state))]
pub async fn inventory<K: Backend>(
    State(state): State<Arc<AppState<K>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Inventory>>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    Ok(Json(state.inventory.find_by_product_id(product_id).await?))
}
