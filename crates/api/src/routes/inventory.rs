//! Inventory read and optimistic-concurrency update endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::InventoryId;
use domain::{Inventory, validate_quantity};
use serde::Deserialize;

use super::parse_id;
use crate::error::ApiError;
use crate::state::{AppState, Backend};

#[derive(Debug, Deserialize)]
pub struct UpdateInventoryRequest {
    pub quantity: i64,
    /// Version the caller last read.
    pub version: i64,
}

/// GET /inventory/{id} — load an inventory record.
#[tracing::instrument(skip(state))]
pub async fn get<K: Backend>(
    State(state): State<Arc<AppState<K>>>,
    Path(id): Path<String>,
) -> Result<Json<Inventory>, ApiError> {
    let inventory_id: InventoryId = parse_id(&id, "inventory")?;
    state
        .inventory
        .find(inventory_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Inventory {id} not found")))
}

/// PUT /inventory/{id} — set the quantity if the version still matches.
#[tracing::instrument(skip(state))]
pub async fn update<K: Backend>(
    State(state): State<Arc<AppState<K>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateInventoryRequest>,
) -> Result<Json<Inventory>, ApiError> {
    let inventory_id: InventoryId = parse_id(&id, "inventory")?;
    let quantity = validate_quantity(req.quantity)?;
    let updated = state
        .inventory
        .update_inventory(inventory_id, quantity, req.version)
        .await?;
    Ok(Json(updated))
}
