//! Inventory records.

use chrono::{DateTime, Utc};
use common::{InventoryId, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Stock held for a single product.
///
/// `version` starts at [`Inventory::INITIAL_VERSION`] and is incremented by
/// exactly one on every conditional update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub id: InventoryId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Inventory {
    /// Version assigned to a freshly inserted record.
    pub const INITIAL_VERSION: i64 = 1;
}

/// Input for inserting an inventory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventory {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl NewInventory {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }

    /// Materializes the record at the initial version.
    pub fn into_inventory(self, id: InventoryId, now: DateTime<Utc>) -> Inventory {
        Inventory {
            id,
            product_id: self.product_id,
            quantity: self.quantity,
            version: Inventory::INITIAL_VERSION,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Converts a caller-supplied quantity into the stored representation.
pub fn validate_quantity(quantity: i64) -> Result<u32, ValidationError> {
    u32::try_from(quantity).map_err(|_| ValidationError::InvalidQuantity {
        quantity,
        max: u32::MAX,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_inventory_starts_at_version_one() {
        let product_id = ProductId::new();
        let inventory = NewInventory::new(product_id, 5).into_inventory(InventoryId::new(), Utc::now());
        assert_eq!(inventory.version, 1);
        assert_eq!(inventory.quantity, 5);
        assert_eq!(inventory.product_id, product_id);
    }

    #[test]
    fn test_validate_quantity_bounds() {
        assert_eq!(validate_quantity(0), Ok(0));
        assert_eq!(validate_quantity(42), Ok(42));
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(i64::from(u32::MAX) + 1).is_err());
    }
}
