//! Orphan product report.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use saga::OrphanProduct;

use crate::error::ApiError;
use crate::state::{AppState, Backend};

/// GET /reconciliation/orphans — products left without inventory.
#[tracing::instrument(skip(state))]
pub async fn orphans<K: Backend>(
    State(state): State<Arc<AppState<K>>>,
) -> Result<Json<Vec<OrphanProduct>>, ApiError> {
    Ok(Json(state.reconciler.find_orphans().await?))
}
