//! Saga pattern implementation for product creation.
//!
//! Creating a product spans two independent stores coordinated over the bus:
//! 1. The product service commits the product and publishes `ProductCreatedEvent`
//! 2. The inventory service creates the inventory record, or publishes
//!    `InventoryCreationFailedEvent` when it cannot
//! 3. On failure the product service deletes the product (compensation)
//!
//! Each product's progress is tracked by a small state machine persisted in
//! a [`SagaJournal`], and the [`Reconciler`] reports products that never
//! reached an outcome.

pub mod config;
pub mod error;
pub mod journal;
pub mod orchestrator;
pub mod reconciler;
pub mod responder;
pub mod services;
pub mod state;

pub use config::{
    INVENTORY_SERVICE_GROUP, OrchestratorConfig, PRODUCT_SERVICE_GROUP, ReconcilerConfig,
    ResponderConfig,
};
pub use error::{ErrorKind, Result, SagaError};
pub use journal::{
    InMemorySagaJournal, PostgresSagaJournal, SagaJournal, SagaJournalExt, SagaRecord,
    SagaTransition, Transition,
};
pub use orchestrator::{CompensationHandler, ProductSagaOrchestrator};
pub use reconciler::{OrphanKind, OrphanProduct, Reconciler};
pub use responder::InventorySagaResponder;
pub use services::{InventoryService, ProductService};
pub use state::{ParseSagaStateError, SagaState};
