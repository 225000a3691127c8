//! Product records and the creation request.

use chrono::{DateTime, Utc};
use common::{ProductId, SellerId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::inventory::validate_quantity;

/// A stored product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub categories: Vec<String>,
    pub is_active: bool,
    pub seller_id: SellerId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product fields supplied by the caller; the store assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub categories: Vec<String>,
    pub is_active: bool,
    pub seller_id: SellerId,
}

impl NewProduct {
    /// Materializes the product under a freshly generated identifier.
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            categories: self.categories,
            is_active: self.is_active,
            seller_id: self.seller_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request to create a product together with its initial stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub seller_id: SellerId,
    #[serde(default)]
    pub quantity: i64,
}

fn default_active() -> bool {
    true
}

/// A `CreateProduct` that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCreateProduct {
    pub product: NewProduct,
    pub quantity: u32,
}

impl CreateProduct {
    /// Creates a request with only the required fields set.
    pub fn new(name: impl Into<String>, price: f64, seller_id: SellerId, quantity: i64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            price,
            categories: Vec::new(),
            is_active: true,
            seller_id,
            quantity,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the ordered category list.
    pub fn with_categories<I, C>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Checks the request and splits it into the product to store and the
    /// quantity to reserve.
    pub fn validate(self) -> Result<ValidatedCreateProduct, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(ValidationError::InvalidPrice { price: self.price });
        }
        let quantity = validate_quantity(self.quantity)?;

        Ok(ValidatedCreateProduct {
            product: NewProduct {
                name: self.name,
                description: self.description,
                price: self.price,
                categories: self.categories,
                is_active: self.is_active,
                seller_id: self.seller_id,
            },
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateProduct {
        CreateProduct::new("Widget", 9.99, SellerId::new(), 5)
    }

    #[test]
    fn test_valid_request_splits_quantity() {
        let validated = request()
            .with_categories(["tools", "hardware"])
            .validate()
            .unwrap();
        assert_eq!(validated.quantity, 5);
        assert_eq!(validated.product.name, "Widget");
        assert_eq!(validated.product.categories, vec!["tools", "hardware"]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut req = request();
        req.name = "   ".to_string();
        assert_eq!(req.validate(), Err(ValidationError::EmptyName));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        for price in [0.0, -1.5, f64::NAN, f64::INFINITY] {
            let mut req = request();
            req.price = price;
            assert!(matches!(
                req.validate(),
                Err(ValidationError::InvalidPrice { .. })
            ));
        }
    }

    #[test]
    fn test_zero_quantity_allowed() {
        let mut req = request();
        req.quantity = 0;
        assert_eq!(req.validate().unwrap().quantity, 0);
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let mut req = request();
        req.quantity = -1;
        assert!(matches!(
            req.validate(),
            Err(ValidationError::InvalidQuantity { quantity: -1, .. })
        ));
    }

    #[test]
    fn test_into_product_uses_same_timestamp() {
        let validated = request().validate().unwrap();
        let id = ProductId::new();
        let now = Utc::now();
        let product = validated.product.into_product(id, now);
        assert_eq!(product.id, id);
        assert_eq!(product.created_at, product.updated_at);
    }

    #[test]
    fn test_request_defaults_when_deserialized() {
        let seller = SellerId::new();
        let json = serde_json::json!({
            "name": "Widget",
            "price": 9.99,
            "seller_id": seller,
        });
        let req: CreateProduct = serde_json::from_value(json).unwrap();
        assert_eq!(req.quantity, 0);
        assert!(req.categories.is_empty());
        assert!(req.is_active);
        assert_eq!(req, CreateProduct::new("Widget", 9.99, seller, 0));
    }

    #[test]
    fn test_request_keeps_explicit_inactive_flag() {
        let json = serde_json::json!({
            "name": "Widget",
            "price": 9.99,
            "seller_id": SellerId::new(),
            "is_active": false,
        });
        let req: CreateProduct = serde_json::from_value(json).unwrap();
        assert!(!req.is_active);
    }
}
