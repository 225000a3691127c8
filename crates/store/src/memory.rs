use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{InventoryId, ProductId};
use domain::{Inventory, NewInventory, NewProduct, Product};
use tokio::sync::RwLock;

use crate::{
    InventoryStore, ProductStore, ProductTransaction, Result, StoreConfig, StoreError,
};

/// Switches used by tests to simulate store faults.
#[derive(Debug, Default)]
struct Faults {
    fail_on_insert: AtomicBool,
    fail_on_commit: AtomicBool,
    fail_on_delete: AtomicBool,
    latency_ms: AtomicU64,
}

impl Faults {
    async fn latency(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn check(&self, flag: &AtomicBool, operation: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{operation} rejected")));
        }
        Ok(())
    }
}

type ProductMap = Arc<RwLock<HashMap<ProductId, Product>>>;

/// In-memory product store for testing.
///
/// Cloning yields another handle to the same data.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    products: ProductMap,
    faults: Arc<Faults>,
    config: StoreConfig,
}

impl InMemoryProductStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Makes every subsequent insert fail.
    pub fn set_fail_on_insert(&self, fail: bool) {
        self.faults.fail_on_insert.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent commit fail.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.faults.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent delete fail.
    pub fn set_fail_on_delete(&self, fail: bool) {
        self.faults.fail_on_delete.store(fail, Ordering::SeqCst);
    }

    /// Adds artificial latency to every operation.
    pub fn set_latency(&self, latency: Duration) {
        self.faults
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Returns the number of stored products.
    pub async fn count(&self) -> usize {
        self.products.read().await.len()
    }
}

struct InMemoryProductTransaction {
    products: ProductMap,
    faults: Arc<Faults>,
    config: StoreConfig,
    staged: Vec<Product>,
}

#[async_trait]
impl ProductTransaction for InMemoryProductTransaction {
    async fn insert(&mut self, product: NewProduct) -> Result<Product> {
        let faults = self.faults.clone();
        let product = self
            .config
            .run("product.insert", async move {
                faults.latency().await;
                faults.check(&faults.fail_on_insert, "insert")?;
                Ok(product.into_product(ProductId::new(), Utc::now()))
            })
            .await?;
        self.staged.push(product.clone());
        Ok(product)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            products,
            faults,
            config,
            staged,
        } = *self;
        config
            .run("product.commit", async move {
                faults.latency().await;
                faults.check(&faults.fail_on_commit, "commit")?;
                let mut products = products.write().await;
                for product in staged {
                    products.insert(product.id, product);
                }
                Ok(())
            })
            .await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn begin(&self) -> Result<Box<dyn ProductTransaction>> {
        Ok(Box::new(InMemoryProductTransaction {
            products: self.products.clone(),
            faults: self.faults.clone(),
            config: self.config,
            staged: Vec::new(),
        }))
    }

    async fn delete(&self, id: ProductId) -> Result<u64> {
        self.config
            .run("product.delete", async {
                self.faults.latency().await;
                self.faults.check(&self.faults.fail_on_delete, "delete")?;
                Ok(self.products.write().await.remove(&id).map_or(0, |_| 1))
            })
            .await
    }

    async fn find(&self, id: ProductId) -> Result<Option<Product>> {
        self.config
            .run("product.find", async {
                self.faults.latency().await;
                Ok(self.products.read().await.get(&id).cloned())
            })
            .await
    }

    async fn list(&self) -> Result<Vec<Product>> {
        self.config
            .run("product.list", async {
                self.faults.latency().await;
                let mut products: Vec<_> = self.products.read().await.values().cloned().collect();
                products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
                Ok(products)
            })
            .await
    }
}

/// In-memory inventory store for testing.
///
/// Conditional updates run under the write lock.
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    records: Arc<RwLock<HashMap<InventoryId, Inventory>>>,
    faults: Arc<Faults>,
    config: StoreConfig,
}

impl InMemoryInventoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Makes every subsequent insert fail.
    pub fn set_fail_on_insert(&self, fail: bool) {
        self.faults.fail_on_insert.store(fail, Ordering::SeqCst);
    }

    /// Adds artificial latency to every operation.
    pub fn set_latency(&self, latency: Duration) {
        self.faults
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Returns the number of stored records.
    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

fn sort_oldest_first(records: &mut [Inventory]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn insert(&self, inventory: NewInventory) -> Result<Inventory> {
        self.config
            .run("inventory.insert", async {
                self.faults.latency().await;
                self.faults.check(&self.faults.fail_on_insert, "insert")?;
                let record = inventory.into_inventory(InventoryId::new(), Utc::now());
                self.records.write().await.insert(record.id, record.clone());
                Ok(record)
            })
            .await
    }

    async fn update_conditional(
        &self,
        id: InventoryId,
        expected_version: i64,
        quantity: u32,
    ) -> Result<Option<Inventory>> {
        self.config
            .run("inventory.update_conditional", async {
                self.faults.latency().await;
                let mut records = self.records.write().await;
                match records.get_mut(&id) {
                    Some(record) if record.version == expected_version => {
                        record.quantity = quantity;
                        record.version += 1;
                        record.updated_at = Utc::now();
                        Ok(Some(record.clone()))
                    }
                    _ => Ok(None),
                }
            })
            .await
    }

    async fn find(&self, id: InventoryId) -> Result<Option<Inventory>> {
        self.config
            .run("inventory.find", async {
                self.faults.latency().await;
                Ok(self.records.read().await.get(&id).cloned())
            })
            .await
    }

    async fn find_by_product_id(&self, product_id: ProductId) -> Result<Vec<Inventory>> {
        self.config
            .run("inventory.find_by_product_id", async {
                self.faults.latency().await;
                let mut records: Vec<_> = self
                    .records
                    .read()
                    .await
                    .values()
                    .filter(|r| r.product_id == product_id)
                    .cloned()
                    .collect();
                sort_oldest_first(&mut records);
                Ok(records)
            })
            .await
    }

    async fn delete(&self, id: InventoryId) -> Result<u64> {
        self.config
            .run("inventory.delete", async {
                self.faults.latency().await;
                Ok(self.records.write().await.remove(&id).map_or(0, |_| 1))
            })
            .await
    }

    async fn list(&self) -> Result<Vec<Inventory>> {
        self.config
            .run("inventory.list", async {
                self.faults.latency().await;
                let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
                sort_oldest_first(&mut records);
                Ok(records)
            })
            .await
    }
}
