use async_trait::async_trait;
use common::ProductId;
use domain::{NewProduct, Product};

use crate::Result;

/// A unit of work against the product store.
///
/// Nothing inserted through a transaction is visible to readers until
/// `commit` succeeds. Dropping an uncommitted transaction discards it.
#[async_trait]
pub trait ProductTransaction: Send {
    /// Inserts a product, generating its identifier.
    async fn insert(&mut self, product: NewProduct) -> Result<Product>;

    /// Makes the inserted products durable and visible.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards the inserted products.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Durable storage for products.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Starts a unit of work.
    async fn begin(&self) -> Result<Box<dyn ProductTransaction>>;

    /// Deletes a product and returns the number of documents removed (0 or 1).
    async fn delete(&self, id: ProductId) -> Result<u64>;

    /// Looks up a product.
    async fn find(&self, id: ProductId) -> Result<Option<Product>>;

    /// Returns every product, oldest first.
    async fn list(&self) -> Result<Vec<Product>>;
}

/// Extension trait providing convenience methods for product stores.
#[async_trait]
pub trait ProductStoreExt: ProductStore {
    /// Inserts a single product in its own transaction.
    async fn insert(&self, product: NewProduct) -> Result<Product> {
        let mut tx = self.begin().await?;
        let product = tx.insert(product).await?;
        tx.commit().await?;
        Ok(product)
    }

    /// Checks if a product exists.
    async fn exists(&self, id: ProductId) -> Result<bool> {
        Ok(self.find(id).await?.is_some())
    }
}

// Blanket implementation for all ProductStore implementations
impl<T: ProductStore + ?Sized> ProductStoreExt for T {}
