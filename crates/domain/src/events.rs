//! Integration events exchanged between the product and inventory services.
//!
//! Every event travels as a bus message whose key names the event type and
//! whose value is the JSON-encoded event body.

use common::ProductId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Topic names.
pub mod topics {
    /// Events emitted by the product service.
    pub const PRODUCT: &str = "product";
    /// Events emitted by the inventory service.
    pub const INVENTORY: &str = "inventory";
}

/// Message keys. Each key identifies one event type.
pub mod keys {
    pub const PRODUCT_CREATED: &str = "product-created";
    pub const INVENTORY_CREATED: &str = "inventory-created";
    pub const INVENTORY_CREATED_FAILED: &str = "inventory-created-failed";
}

/// An event with a fixed topic and key.
pub trait IntegrationEvent: Serialize + DeserializeOwned {
    /// Topic the event is published to.
    const TOPIC: &'static str;
    /// Key carried by every message of this type.
    const KEY: &'static str;

    /// Encodes the event body.
    fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decodes an event body.
    fn from_payload(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Emitted once per committed product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreatedEvent {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl IntegrationEvent for ProductCreatedEvent {
    const TOPIC: &'static str = topics::PRODUCT;
    const KEY: &'static str = keys::PRODUCT_CREATED;
}

/// Emitted when the inventory record for a product could not be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCreationFailedEvent {
    pub product_id: ProductId,
}

impl IntegrationEvent for InventoryCreationFailedEvent {
    const TOPIC: &'static str = topics::INVENTORY;
    const KEY: &'static str = keys::INVENTORY_CREATED_FAILED;
}

/// Emitted when the inventory record for a product was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCreatedEvent {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl IntegrationEvent for InventoryCreatedEvent {
    const TOPIC: &'static str = topics::INVENTORY;
    const KEY: &'static str = keys::INVENTORY_CREATED;
}

/// Event types recognised by the consumers in this workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKey {
    ProductCreated,
    InventoryCreated,
    InventoryCreationFailed,
}

impl EventKey {
    /// Maps a message key to a known event type.
    ///
    /// Unknown keys return `None`; consumers skip such messages.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            keys::PRODUCT_CREATED => Some(EventKey::ProductCreated),
            keys::INVENTORY_CREATED => Some(EventKey::InventoryCreated),
            keys::INVENTORY_CREATED_FAILED => Some(EventKey::InventoryCreationFailed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKey::ProductCreated => keys::PRODUCT_CREATED,
            EventKey::InventoryCreated => keys::INVENTORY_CREATED,
            EventKey::InventoryCreationFailed => keys::INVENTORY_CREATED_FAILED,
        }
    }
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
