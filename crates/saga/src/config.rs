//! Settings for the saga components.

use std::time::Duration;

use event_bus::ConsumerConfig;

/// Consumer group used by the product service.
pub const PRODUCT_SERVICE_GROUP: &str = "product-service";

/// Consumer group used by the inventory service.
pub const INVENTORY_SERVICE_GROUP: &str = "inventory-service";

/// Settings for [`crate::ProductSagaOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Consumer used by the inventory-outcome listener.
    pub consumer: ConsumerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            consumer: ConsumerConfig::new(PRODUCT_SERVICE_GROUP),
        }
    }
}

/// Settings for [`crate::InventorySagaResponder`].
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Skip creation when the product already has an inventory record.
    ///
    /// Off by default: a redelivered event then inserts a second record.
    pub dedupe_by_product: bool,
    /// Consumer used for the product topic.
    pub consumer: ConsumerConfig,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            dedupe_by_product: false,
            consumer: ConsumerConfig::new(INVENTORY_SERVICE_GROUP),
        }
    }
}

/// Settings for [`crate::Reconciler`].
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    /// How long a product may lack inventory before it is reported.
    pub pending_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            pending_timeout: Duration::from_secs(30),
        }
    }
}
