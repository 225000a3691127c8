use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{InventoryId, ProductId, SellerId};
use domain::{Inventory, NewInventory, NewProduct, Product};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    InventoryStore, ProductStore, ProductTransaction, Result, StoreConfig, StoreError,
};

/// Runs the database migrations shared by every PostgreSQL component.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, categories, is_active, seller_id, created_at, updated_at";

const INVENTORY_COLUMNS: &str = "id, product_id, quantity, version, created_at, updated_at";

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        categories: row.try_get("categories")?,
        is_active: row.try_get("is_active")?,
        seller_id: SellerId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn row_to_inventory(row: PgRow) -> Result<Inventory> {
    let id = InventoryId::from_uuid(row.try_get::<Uuid, _>("id")?);
    let quantity: i64 = row.try_get("quantity")?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| StoreError::Corrupt(format!("inventory {id} has quantity {quantity}")))?;

    Ok(Inventory {
        id,
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity,
        version: row.try_get("version")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// PostgreSQL-backed product store.
#[derive(Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
    config: StoreConfig,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

struct PostgresProductTransaction {
    tx: Transaction<'static, Postgres>,
    config: StoreConfig,
}

#[async_trait]
impl ProductTransaction for PostgresProductTransaction {
    async fn insert(&mut self, product: NewProduct) -> Result<Product> {
        let product = product.into_product(ProductId::new(), Utc::now());
        let tx = &mut self.tx;

        self.config
            .run("product.insert", async {
                sqlx::query(&format!(
                    "INSERT INTO products ({PRODUCT_COLUMNS}) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
                ))
                .bind(product.id.as_uuid())
                .bind(&product.name)
                .bind(&product.description)
                .bind(product.price)
                .bind(&product.categories)
                .bind(product.is_active)
                .bind(product.seller_id.as_uuid())
                .bind(product.created_at)
                .bind(product.updated_at)
                .execute(&mut **tx)
                .await?;
                Ok(())
            })
            .await?;

        Ok(product)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { tx, config } = *self;
        config
            .run("product.commit", async move {
                tx.commit().await?;
                Ok(())
            })
            .await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let Self { tx, config } = *self;
        config
            .run("product.rollback", async move {
                tx.rollback().await?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    async fn begin(&self) -> Result<Box<dyn ProductTransaction>> {
        let tx = self
            .config
            .run("product.begin", async { Ok(self.pool.begin().await?) })
            .await?;
        Ok(Box::new(PostgresProductTransaction {
            tx,
            config: self.config,
        }))
    }

    async fn delete(&self, id: ProductId) -> Result<u64> {
        self.config
            .run("product.delete", async {
                let result = sqlx::query("DELETE FROM products WHERE id = $1")
                    .bind(id.as_uuid())
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected())
            })
            .await
    }

    async fn find(&self, id: ProductId) -> Result<Option<Product>> {
        self.config
            .run("product.find", async {
                sqlx::query(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
                ))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
                .map(row_to_product)
                .transpose()
            })
            .await
    }

    async fn list(&self) -> Result<Vec<Product>> {
        self.config
            .run("product.list", async {
                sqlx::query(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at, id"
                ))
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(row_to_product)
                .collect()
            })
            .await
    }
}

/// PostgreSQL-backed inventory store.
///
/// Conditional updates are a single `UPDATE ... WHERE id = $1 AND version = $2`,
/// so concurrent writers holding the same version race on the row lock and
/// exactly one of them matches.
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
    config: StoreConfig,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn insert(&self, inventory: NewInventory) -> Result<Inventory> {
        let record = inventory.into_inventory(InventoryId::new(), Utc::now());

        self.config
            .run("inventory.insert", async {
                sqlx::query(&format!(
                    "INSERT INTO inventories ({INVENTORY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
                ))
                .bind(record.id.as_uuid())
                .bind(record.product_id.as_uuid())
                .bind(i64::from(record.quantity))
                .bind(record.version)
                .bind(record.created_at)
                .bind(record.updated_at)
                .execute(&self.pool)
                .await?;
                Ok(())
            })
            .await?;

        Ok(record)
    }

    async fn update_conditional(
        &self,
        id: InventoryId,
        expected_version: i64,
        quantity: u32,
    ) -> Result<Option<Inventory>> {
        self.config
            .run("inventory.update_conditional", async {
                sqlx::query(&format!(
                    r#"
                    UPDATE inventories
                    SET quantity = $3, version = version + 1, updated_at = $4
                    WHERE id = $1 AND version = $2
                    RETURNING {INVENTORY_COLUMNS}
                    "#
                ))
                .bind(id.as_uuid())
                .bind(expected_version)
                .bind(i64::from(quantity))
                .bind(Utc::now())
                .fetch_optional(&self.pool)
                .await?
                .map(row_to_inventory)
                .transpose()
            })
            .await
    }

    async fn find(&self, id: InventoryId) -> Result<Option<Inventory>> {
        self.config
            .run("inventory.find", async {
                sqlx::query(&format!(
                    "SELECT {INVENTORY_COLUMNS} FROM inventories WHERE id = $1"
                ))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
                .map(row_to_inventory)
                .transpose()
            })
            .await
    }

    async fn find_by_product_id(&self, product_id: ProductId) -> Result<Vec<Inventory>> {
        self.config
            .run("inventory.find_by_product_id", async {
                sqlx::query(&format!(
                    "SELECT {INVENTORY_COLUMNS} FROM inventories \
                     WHERE product_id = $1 ORDER BY created_at, id"
                ))
                .bind(product_id.as_uuid())
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(row_to_inventory)
                .collect()
            })
            .await
    }

    async fn delete(&self, id: InventoryId) -> Result<u64> {
        self.config
            .run("inventory.delete", async {
                let result = sqlx::query("DELETE FROM inventories WHERE id = $1")
                    .bind(id.as_uuid())
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected())
            })
            .await
    }

    async fn list(&self) -> Result<Vec<Inventory>> {
        self.config
            .run("inventory.list", async {
                sqlx::query(&format!(
                    "SELECT {INVENTORY_COLUMNS} FROM inventories ORDER BY created_at, id"
                ))
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(row_to_inventory)
                .collect()
            })
            .await
    }
}
