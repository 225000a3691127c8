//! Shared types for the product and inventory services.

mod types;

pub use types::{InventoryId, ParseIdError, ProductId, SellerId};
