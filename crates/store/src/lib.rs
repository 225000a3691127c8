//! Durable stores for products and inventory records.
//!
//! Each store is a trait with an in-memory implementation (tests, local
//! runs, fault injection) and a PostgreSQL implementation. Every operation
//! runs under a bounded deadline and fails with `StoreError::Timeout` when
//! it is exceeded.

pub mod config;
pub mod error;
pub mod inventory;
pub mod memory;
pub mod postgres;
pub mod product;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use inventory::InventoryStore;
pub use memory::{InMemoryInventoryStore, InMemoryProductStore};
pub use postgres::{PostgresInventoryStore, PostgresProductStore, run_migrations};
pub use product::{ProductStore, ProductStoreExt, ProductTransaction};
