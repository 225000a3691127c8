//! Product saga orchestrator.
//!
//! Drives the product side of the creation saga:
//! 1. Validate the request and commit the product in a unit of work
//! 2. Publish `ProductCreatedEvent` to the product topic
//! 3. Listen on the inventory topic and delete the product when
//!    `InventoryCreationFailedEvent` arrives
//!
//! No transaction spans the product store, the bus and the inventory
//! store. Between steps 2 and 3 a product exists without inventory.

use std::time::Instant;

use async_trait::async_trait;
use common::ProductId;
use domain::{
    CreateProduct, EventKey, IntegrationEvent, InventoryCreatedEvent, InventoryCreationFailedEvent,
    Product, ProductCreatedEvent, topics,
};
use event_bus::{Consumer, ConsumerHandle, EventBus, Message, MessageHandler, spawn_consumer};
use store::ProductStore;
use tokio::sync::Mutex;

use crate::config::OrchestratorConfig;
use crate::error::{Result, SagaError};
use crate::journal::{SagaJournal, SagaJournalExt};
use crate::services::ProductService;
use crate::state::SagaState;

/// Orchestrates product creation and its compensation.
pub struct ProductSagaOrchestrator<P, B, J> {
    products: ProductService<P>,
    bus: B,
    journal: J,
    config: OrchestratorConfig,
    listener: Mutex<Option<ConsumerHandle>>,
}

impl<P, B, J> ProductSagaOrchestrator<P, B, J>
where
    P: ProductStore + Clone + 'static,
    B: EventBus + Clone + 'static,
    J: SagaJournal + Clone + 'static,
{
    /// Creates a new orchestrator. The listener starts lazily.
    pub fn new(store: P, bus: B, journal: J, config: OrchestratorConfig) -> Self {
        Self {
            products: ProductService::new(store),
            bus,
            journal,
            config,
            listener: Mutex::new(None),
        }
    }

    /// Returns the product service.
    pub fn products(&self) -> &ProductService<P> {
        &self.products
    }

    /// Returns the saga journal.
    pub fn journal(&self) -> &J {
        &self.journal
    }

    /// Creates a product and starts its saga.
    ///
    /// Errors are returned to the caller. A publish failure after the commit
    /// leaves the product in place with its saga in `Created`; the
    /// reconciler reports such products.
    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(&self, request: CreateProduct) -> Result<Product> {
        let started = Instant::now();
        let validated = request.validate()?;

        let product = self
            .products
            .create_with_transaction(validated.product)
            .await?;
        metrics::counter!("saga_products_created_total").increment(1);
        self.journal.record(product.id, SagaState::Created).await;

        let event = ProductCreatedEvent {
            product_id: product.id,
            quantity: validated.quantity,
        };
        if let Err(e) = self.publish(&event).await {
            metrics::counter!("saga_publish_failures_total").increment(1);
            tracing::error!(
                product_id = %product.id,
                error = %e,
                "product committed but its event was not published"
            );
            return Err(e);
        }

        self.journal
            .record(product.id, SagaState::ReservationPending)
            .await;
        self.start_listener().await;

        metrics::histogram!("saga_create_product_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(product_id = %product.id, quantity = validated.quantity, "product saga started");
        Ok(product)
    }

    async fn publish(&self, event: &ProductCreatedEvent) -> Result<()> {
        let payload = event.to_payload()?;
        let delivery = self
            .bus
            .publish(ProductCreatedEvent::TOPIC, ProductCreatedEvent::KEY, payload)
            .await?;
        tracing::debug!(
            topic = %delivery.topic,
            partition = delivery.partition,
            offset = delivery.offset,
            "product created event published"
        );
        Ok(())
    }

    /// Starts the inventory-outcome listener, or reuses the running one.
    pub async fn start_listener(&self) {
        let mut listener = self.listener.lock().await;
        if listener.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let consumer = Consumer::new(
            self.bus.clone(),
            topics::INVENTORY,
            self.config.consumer.clone(),
        );
        let handler = CompensationHandler {
            products: self.products.clone(),
            journal: self.journal.clone(),
        };
        *listener = Some(spawn_consumer(consumer, handler));
        tracing::info!(group = %self.config.consumer.group, "inventory outcome listener started");
    }

    /// Returns true while the listener task is running.
    pub async fn listener_running(&self) -> bool {
        self.listener
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the listener, letting an in-flight compensation finish.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.shutdown().await;
        }
    }
}

/// Reacts to inventory outcomes for products created by this service.
#[derive(Clone)]
pub struct CompensationHandler<P, J> {
    products: ProductService<P>,
    journal: J,
}

impl<P, J> CompensationHandler<P, J>
where
    P: ProductStore,
    J: SagaJournal,
{
    pub fn new(store: P, journal: J) -> Self {
        Self {
            products: ProductService::new(store),
            journal,
        }
    }

    /// Deletes the product whose inventory could not be created.
    #[tracing::instrument(skip(self))]
    pub async fn compensate(&self, product_id: ProductId) -> Result<u64> {
        let deleted = self.products.rollback_product(product_id).await?;
        metrics::counter!("saga_compensations_total").increment(1);
        self.journal.record(product_id, SagaState::Compensated).await;
        Ok(deleted)
    }

    /// Marks the product's inventory as created.
    pub async fn confirm(&self, product_id: ProductId) {
        self.journal
            .record(product_id, SagaState::ReservationConfirmed)
            .await;
    }
}

#[async_trait]
impl<P, J> MessageHandler for CompensationHandler<P, J>
where
    P: ProductStore + 'static,
    J: SagaJournal + 'static,
{
    type Error = SagaError;

    async fn handle(&self, message: &Message) -> Result<()> {
        match EventKey::from_key(&message.key) {
            Some(EventKey::InventoryCreationFailed) => {
                let event = InventoryCreationFailedEvent::from_payload(&message.value)?;
                tracing::info!(product_id = %event.product_id, "inventory creation failed, compensating");
                self.compensate(event.product_id).await?;
            }
            Some(EventKey::InventoryCreated) => {
                let event = InventoryCreatedEvent::from_payload(&message.value)?;
                self.confirm(event.product_id).await;
            }
            _ => {
                tracing::debug!(key = %message.key, "ignoring message");
            }
        }
        Ok(())
    }
}
