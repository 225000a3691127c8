//! Domain layer for the product and inventory services.
//!
//! This crate provides:
//! - `Product` and `Inventory` records and their creation inputs
//! - `CreateProduct` request validation
//! - Integration events exchanged between the two services over the bus

pub mod error;
pub mod events;
pub mod inventory;
pub mod product;

pub use error::ValidationError;
pub use events::{
    EventKey, IntegrationEvent, InventoryCreatedEvent, InventoryCreationFailedEvent,
    ProductCreatedEvent, keys, topics,
};
pub use inventory::{Inventory, NewInventory, validate_quantity};
pub use product::{CreateProduct, NewProduct, Product, ValidatedCreateProduct};
