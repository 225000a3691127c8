//! Inventory service: creation and optimistic-concurrency updates.

use common::{InventoryId, ProductId};
use domain::{Inventory, NewInventory};
use store::InventoryStore;

use crate::error::{Result, SagaError};

/// Inventory operations used by the responder and the HTTP layer.
#[derive(Clone)]
pub struct InventoryService<I> {
    store: I,
}

impl<I: InventoryStore> InventoryService<I> {
    /// Creates a new inventory service.
    pub fn new(store: I) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &I {
        &self.store
    }

    /// Inserts a fresh inventory record at version 1.
    #[tracing::instrument(skip(self))]
    pub async fn add_inventory(&self, product_id: ProductId, quantity: u32) -> Result<Inventory> {
        let record = self
            .store
            .insert(NewInventory::new(product_id, quantity))
            .await?;
        tracing::debug!(inventory_id = %record.id, "inventory created");
        Ok(record)
    }

    /// Sets the quantity if the record is still at `expected_version`.
    ///
    /// On success the version is incremented by one. Fails with
    /// `ConcurrentModification` when another writer got there first and with
    /// `InventoryNotFound` when the id is unknown. Never retries.
    #[tracing::instrument(skip(self))]
    pub async fn update_inventory(
        &self,
        id: InventoryId,
        quantity: u32,
        expected_version: i64,
    ) -> Result<Inventory> {
        if let Some(updated) = self
            .store
            .update_conditional(id, expected_version, quantity)
            .await?
        {
            return Ok(updated);
        }

        match self.store.find(id).await? {
            Some(current) => {
                tracing::debug!(actual_version = current.version, "stale inventory version");
                Err(SagaError::ConcurrentModification {
                    id,
                    expected_version,
                    actual_version: current.version,
                })
            }
            None => Err(SagaError::InventoryNotFound(id)),
        }
    }

    /// Looks up a record.
    pub async fn find(&self, id: InventoryId) -> Result<Option<Inventory>> {
        Ok(self.store.find(id).await?)
    }

    /// Returns every record for a product, oldest first.
    pub async fn find_by_product_id(&self, product_id: ProductId) -> Result<Vec<Inventory>> {
        Ok(self.store.find_by_product_id(product_id).await?)
    }

    /// Deletes a record. Returns the number of records removed.
    #[tracing::instrument(skip(self))]
    pub async fn remove_inventory(&self, id: InventoryId) -> Result<u64> {
        Ok(self.store.delete(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use store::InMemoryInventoryStore;

    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_add_then_update() {
        let service = InventoryService::new(InMemoryInventoryStore::new());
        let record = service.add_inventory(ProductId::new(), 5).await.unwrap();

        let updated = service.update_inventory(record.id, 3, 1).await.unwrap();
        assert_eq!(updated.quantity, 3);
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn test_stale_version_is_concurrent_modification() {
        let service = InventoryService::new(InMemoryInventoryStore::new());
        let record = service.add_inventory(ProductId::new(), 5).await.unwrap();
        service.update_inventory(record.id, 4, 1).await.unwrap();

        let err = service.update_inventory(record.id, 3, 1).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::ConcurrentModification {
                expected_version: 1,
                actual_version: 2,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::ConcurrentModification);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let service = InventoryService::new(InMemoryInventoryStore::new());
        let err = service
            .update_inventory(InventoryId::new(), 3, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::InventoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_updates_with_same_version() {
        let service = InventoryService::new(InMemoryInventoryStore::new());
        let record = service.add_inventory(ProductId::new(), 5).await.unwrap();

        let (a, b) = tokio::join!(
            service.update_inventory(record.id, 10, 1),
            service.update_inventory(record.id, 20, 1),
        );

        let results = [a, b];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(SagaError::ConcurrentModification { .. })))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 1);
        assert_eq!(service.find(record.id).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_remove_inventory() {
        let service = InventoryService::new(InMemoryInventoryStore::new());
        let record = service.add_inventory(ProductId::new(), 5).await.unwrap();

        assert_eq!(service.remove_inventory(record.id).await.unwrap(), 1);
        assert!(service.find(record.id).await.unwrap().is_none());
    }
}
