//! Detection of products left without inventory.
//!
//! A product whose event was never published (publish failed after commit)
//! or whose outcome never arrived has no inventory and no pending message.
//! Nothing repairs such products automatically; the reconciler only reports
//! them.

use chrono::{DateTime, TimeDelta, Utc};
use common::ProductId;
use serde::Serialize;
use store::{InventoryStore, ProductStore};

use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::journal::SagaJournal;
use crate::state::SagaState;

/// Why a product is considered orphaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanKind {
    /// The product's event was never published.
    Unpublished,
    /// The event was published but no inventory outcome arrived in time.
    Stalled,
}

/// A product without an inventory record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanProduct {
    pub product_id: ProductId,
    pub kind: OrphanKind,
    /// Saga state at detection time; None if no saga was recorded.
    pub saga_state: Option<SagaState>,
    /// When the product entered its current state.
    pub since: DateTime<Utc>,
}

/// Reports products stuck in the in-flight window.
pub struct Reconciler<P, I, J> {
    products: P,
    inventory: I,
    journal: J,
    config: ReconcilerConfig,
}

impl<P, I, J> Reconciler<P, I, J>
where
    P: ProductStore,
    I: InventoryStore,
    J: SagaJournal,
{
    pub fn new(products: P, inventory: I, journal: J, config: ReconcilerConfig) -> Self {
        Self {
            products,
            inventory,
            journal,
            config,
        }
    }

    /// Lists products that have had no inventory for longer than the
    /// pending timeout.
    #[tracing::instrument(skip(self))]
    pub async fn find_orphans(&self) -> Result<Vec<OrphanProduct>> {
        let grace = TimeDelta::from_std(self.config.pending_timeout).unwrap_or(TimeDelta::MAX);
        let now = Utc::now();
        let mut orphans = Vec::new();

        for product in self.products.list().await? {
            if !self
                .inventory
                .find_by_product_id(product.id)
                .await?
                .is_empty()
            {
                continue;
            }

            let record = self.journal.current(product.id).await?;
            let (kind, since) = match &record {
                None => (OrphanKind::Unpublished, product.created_at),
                Some(r) if r.state == SagaState::Created => (OrphanKind::Unpublished, r.updated_at),
                Some(r) if r.state == SagaState::ReservationPending => {
                    (OrphanKind::Stalled, r.updated_at)
                }
                Some(_) => continue,
            };

            if now.signed_duration_since(since) < grace {
                continue;
            }

            orphans.push(OrphanProduct {
                product_id: product.id,
                kind,
                saga_state: record.map(|r| r.state),
                since,
            });
        }

        if !orphans.is_empty() {
            tracing::warn!(count = orphans.len(), "products without inventory detected");
        }
        Ok(orphans)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::SellerId;
    use domain::{CreateProduct, NewInventory};
    use store::{InMemoryInventoryStore, InMemoryProductStore, ProductStoreExt};

    use super::*;
    use crate::journal::InMemorySagaJournal;

    fn setup() -> (
        Reconciler<InMemoryProductStore, InMemoryInventoryStore, InMemorySagaJournal>,
        InMemoryProductStore,
        InMemoryInventoryStore,
        InMemorySagaJournal,
    ) {
        let products = InMemoryProductStore::new();
        let inventory = InMemoryInventoryStore::new();
        let journal = InMemorySagaJournal::new();
        let reconciler = Reconciler::new(
            products.clone(),
            inventory.clone(),
            journal.clone(),
            ReconcilerConfig {
                pending_timeout: Duration::ZERO,
            },
        );
        (reconciler, products, inventory, journal)
    }

    async fn insert_product(products: &InMemoryProductStore) -> ProductId {
        let request = CreateProduct::new("Widget", 9.99, SellerId::new(), 1);
        products
            .insert(request.validate().unwrap().product)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_product_without_saga_is_unpublished() {
        let (reconciler, products, _, _) = setup();
        let product_id = insert_product(&products).await;

        let orphans = reconciler.find_orphans().await.unwrap();

        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].product_id, product_id);
        assert_eq!(orphans[0].kind, OrphanKind::Unpublished);
        assert_eq!(orphans[0].saga_state, None);
    }

    #[tokio::test]
    async fn test_pending_saga_is_stalled() {
        let (reconciler, products, _, journal) = setup();
        let product_id = insert_product(&products).await;
        journal.transition(product_id, SagaState::Created).await.unwrap();
        journal
            .transition(product_id, SagaState::ReservationPending)
            .await
            .unwrap();

        let orphans = reconciler.find_orphans().await.unwrap();

        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].kind, OrphanKind::Stalled);
        assert_eq!(orphans[0].saga_state, Some(SagaState::ReservationPending));
    }

    #[tokio::test]
    async fn test_product_with_inventory_is_not_orphaned() {
        let (reconciler, products, inventory, _) = setup();
        let product_id = insert_product(&products).await;
        inventory
            .insert(NewInventory::new(product_id, 1))
            .await
            .unwrap();

        assert!(reconciler.find_orphans().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_products_are_within_grace_period() {
        let products = InMemoryProductStore::new();
        let reconciler = Reconciler::new(
            products.clone(),
            InMemoryInventoryStore::new(),
            InMemorySagaJournal::new(),
            ReconcilerConfig::default(),
        );
        insert_product(&products).await;

        assert!(reconciler.find_orphans().await.unwrap().is_empty());
    }
}
