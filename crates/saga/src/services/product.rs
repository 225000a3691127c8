//! Product service: transactional creation and compensating delete.

use common::ProductId;
use domain::{NewProduct, Product};
use store::ProductStore;

use crate::error::{Result, SagaError};

/// Product operations used by the orchestrator.
#[derive(Clone)]
pub struct ProductService<P> {
    store: P,
}

impl<P: ProductStore> ProductService<P> {
    /// Creates a new product service.
    pub fn new(store: P) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &P {
        &self.store
    }

    /// Inserts a product inside a unit of work and commits it.
    ///
    /// If the insert fails the transaction is rolled back; if the commit
    /// fails nothing was written.
    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_with_transaction(&self, product: NewProduct) -> Result<Product> {
        let mut tx = self.store.begin().await?;

        let product = match tx.insert(product).await {
            Ok(product) => product,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback after failed insert failed");
                }
                return Err(e.into());
            }
        };

        tx.commit().await?;
        tracing::debug!(product_id = %product.id, "product committed");
        Ok(product)
    }

    /// Deletes a product as a compensating action.
    ///
    /// Returns the number of products removed. Deleting a product that is
    /// already gone is reported but is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn rollback_product(&self, product_id: ProductId) -> Result<u64> {
        let deleted = self.store.delete(product_id).await?;
        if deleted == 0 {
            tracing::warn!(%product_id, "product already deleted");
        } else {
            tracing::info!(%product_id, "product deleted");
        }
        Ok(deleted)
    }

    /// Looks up a product.
    pub async fn find(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.store.find(product_id).await?)
    }

    /// Loads a product, failing with `ProductNotFound` when it does not exist.
    pub async fn get(&self, product_id: ProductId) -> Result<Product> {
        self.find(product_id)
            .await?
            .ok_or(SagaError::ProductNotFound(product_id))
    }

    /// Returns every product, oldest first.
    pub async fn list(&self) -> Result<Vec<Product>> {
        Ok(self.store.list().await?)
    }
}
