//! Services wrapping the stores with saga-level error handling.

pub mod inventory;
pub mod product;

pub use inventory::InventoryService;
pub use product::ProductService;
