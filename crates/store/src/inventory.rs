use async_trait::async_trait;
use common::{InventoryId, ProductId};
use domain::{Inventory, NewInventory};

use crate::Result;

/// Durable storage for inventory records.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Inserts a fresh record at version 1.
    async fn insert(&self, inventory: NewInventory) -> Result<Inventory>;

    /// Sets the quantity of the record matching both `id` and
    /// `expected_version`, incrementing its version by one.
    ///
    /// Returns the updated record, or None if no record matched (unknown id
    /// or a different version).
    async fn update_conditional(
        &self,
        id: InventoryId,
        expected_version: i64,
        quantity: u32,
    ) -> Result<Option<Inventory>>;

    /// Looks up a record.
    async fn find(&self, id: InventoryId) -> Result<Option<Inventory>>;

    /// Returns every record for a product, oldest first.
    ///
    /// More than one record means a duplicate creation slipped through.
    async fn find_by_product_id(&self, product_id: ProductId) -> Result<Vec<Inventory>>;

    /// Deletes a record and returns the number of records removed (0 or 1).
    async fn delete(&self, id: InventoryId) -> Result<u64>;

    /// Returns every record, oldest first.
    async fn list(&self) -> Result<Vec<Inventory>>;
}
