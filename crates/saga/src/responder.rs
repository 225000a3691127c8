//! Inventory saga responder.
//!
//! Consumes `ProductCreatedEvent` from the product topic and creates the
//! product's inventory record. When the insert fails it publishes
//! `InventoryCreationFailedEvent` so the product service can compensate;
//! the insert itself is never retried.

use async_trait::async_trait;
use domain::{
    EventKey, IntegrationEvent, Inventory, InventoryCreatedEvent, InventoryCreationFailedEvent,
    ProductCreatedEvent, topics,
};
use event_bus::{Consumer, ConsumerHandle, EventBus, Message, MessageHandler, spawn_consumer};
use store::InventoryStore;

use crate::config::ResponderConfig;
use crate::error::{Result, SagaError};
use crate::services::InventoryService;

/// Creates inventory for newly created products.
#[derive(Clone)]
pub struct InventorySagaResponder<I, B> {
    inventory: InventoryService<I>,
    bus: B,
    config: ResponderConfig,
}

impl<I, B> InventorySagaResponder<I, B>
where
    I: InventoryStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    /// Creates a new responder.
    pub fn new(store: I, bus: B, config: ResponderConfig) -> Self {
        Self {
            inventory: InventoryService::new(store),
            bus,
            config,
        }
    }

    /// Starts consuming the product topic in the background.
    pub fn start(self) -> ConsumerHandle {
        let consumer = Consumer::new(
            self.bus.clone(),
            topics::PRODUCT,
            self.config.consumer.clone(),
        );
        tracing::info!(
            group = %self.config.consumer.group,
            dedupe = self.config.dedupe_by_product,
            "inventory saga responder started"
        );
        spawn_consumer(consumer, self)
    }

    /// Creates the inventory record for one event.
    ///
    /// Returns None when deduplication is enabled and the product already
    /// has a record. On store failure, lookup included, the failure event is
    /// published and the original error returned.
    #[tracing::instrument(skip(self, event), fields(product_id = %event.product_id))]
    pub async fn handle_product_created(
        &self,
        event: ProductCreatedEvent,
    ) -> Result<Option<Inventory>> {
        let record = match self.create_inventory(&event).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(e) => {
                metrics::counter!("saga_inventory_failures_total").increment(1);
                tracing::warn!(error = %e, "inventory creation failed");
                let failed = InventoryCreationFailedEvent {
                    product_id: event.product_id,
                };
                if let Err(publish) = self.publish(&failed).await {
                    tracing::error!(error = %publish, "failed to publish inventory failure event");
                }
                return Err(e);
            }
        };

        metrics::counter!("saga_inventory_created_total").increment(1);
        let created = InventoryCreatedEvent {
            product_id: event.product_id,
            quantity: record.quantity,
        };
        if let Err(e) = self.publish(&created).await {
            tracing::warn!(error = %e, "failed to publish inventory created event");
        }

        Ok(Some(record))
    }

    async fn create_inventory(&self, event: &ProductCreatedEvent) -> Result<Option<Inventory>> {
        if self.config.dedupe_by_product {
            let existing = self.inventory.find_by_product_id(event.product_id).await?;
            if !existing.is_empty() {
                tracing::info!(records = existing.len(), "inventory already exists, skipping");
                return Ok(None);
            }
        }
        let record = self
            .inventory
            .add_inventory(event.product_id, event.quantity)
            .await?;
        Ok(Some(record))
    }

    async fn publish<E: IntegrationEvent>(&self, event: &E) -> Result<()> {
        self.bus
            .publish(E::TOPIC, E::KEY, event.to_payload()?)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<I, B> MessageHandler for InventorySagaResponder<I, B>
where
    I: InventoryStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    type Error = SagaError;

    async fn handle(&self, message: &Message) -> Result<()> {
        if EventKey::from_key(&message.key) != Some(EventKey::ProductCreated) {
            tracing::debug!(key = %message.key, "ignoring message");
            return Ok(());
        }
        let event = ProductCreatedEvent::from_payload(&message.value)?;
        self.handle_product_created(event).await?;
        Ok(())
    }
}
