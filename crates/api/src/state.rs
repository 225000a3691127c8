//! Backends and the shared application state.

use std::marker::PhantomData;

use event_bus::{BusConfig, ConsumerHandle, EventBus, InMemoryEventBus, PostgresEventBus};
use saga::{
    InMemorySagaJournal, InventoryService, InventorySagaResponder, PostgresSagaJournal,
    ProductSagaOrchestrator, Reconciler, ResponderConfig, SagaJournal,
};
use sqlx::PgPool;
use store::{
    InMemoryInventoryStore, InMemoryProductStore, InventoryStore, PostgresInventoryStore,
    PostgresProductStore, ProductStore,
};
use tokio::sync::Mutex;

use crate::config::Config;

/// The set of store, bus and journal implementations a process runs on.
pub trait Backend: Send + Sync + 'static {
    type Products: ProductStore + Clone + 'static;
    type Inventory: InventoryStore + Clone + 'static;
    type Bus: EventBus + Clone + 'static;
    type Journal: SagaJournal + Clone + 'static;
}

/// Everything in process memory.
pub struct InMemoryBackend;

impl Backend for InMemoryBackend {
    type Products = InMemoryProductStore;
    type Inventory = InMemoryInventoryStore;
    type Bus = InMemoryEventBus;
    type Journal = InMemorySagaJournal;
}

/// Everything in one PostgreSQL database.
pub struct PostgresBackend;

impl Backend for PostgresBackend {
    type Products = PostgresProductStore;
    type Inventory = PostgresInventoryStore;
    type Bus = PostgresEventBus;
    type Journal = PostgresSagaJournal;
}

/// Handles to one backend's components, built once at process start.
pub struct Components<K: Backend> {
    pub products: K::Products,
    pub inventory: K::Inventory,
    pub bus: K::Bus,
    pub journal: K::Journal,
    _backend: PhantomData<K>,
}

impl<K: Backend> Components<K> {
    pub fn new(
        products: K::Products,
        inventory: K::Inventory,
        bus: K::Bus,
        journal: K::Journal,
    ) -> Self {
        Self {
            products,
            inventory,
            bus,
            journal,
            _backend: PhantomData,
        }
    }
}

impl Components<InMemoryBackend> {
    /// Builds fresh in-memory components.
    pub fn in_memory(config: &Config) -> Self {
        let store_config = config.store_config();
        Self::new(
            InMemoryProductStore::with_config(store_config),
            InMemoryInventoryStore::with_config(store_config),
            InMemoryEventBus::new(),
            InMemorySagaJournal::new(),
        )
    }
}

impl Components<PostgresBackend> {
    /// Builds PostgreSQL components sharing one pool.
    pub fn postgres(pool: PgPool, config: &Config) -> Self {
        let store_config = config.store_config();
        Self::new(
            PostgresProductStore::new(pool.clone(), store_config),
            PostgresInventoryStore::new(pool.clone(), store_config),
            PostgresEventBus::new(pool.clone(), BusConfig::default()),
            PostgresSagaJournal::new(pool, store_config),
        )
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState<K: Backend> {
    pub orchestrator: ProductSagaOrchestrator<K::Products, K::Bus, K::Journal>,
    pub inventory: InventoryService<K::Inventory>,
    pub reconciler: Reconciler<K::Products, K::Inventory, K::Journal>,
    bus: K::Bus,
    responder_config: ResponderConfig,
    responder: Mutex<Option<ConsumerHandle>>,
}

impl<K: Backend> AppState<K> {
    /// Wires the saga components together.
    pub fn new(components: Components<K>, config: &Config) -> Self {
        let Components {
            products,
            inventory,
            bus,
            journal,
            ..
        } = components;

        Self {
            orchestrator: ProductSagaOrchestrator::new(
                products.clone(),
                bus.clone(),
                journal.clone(),
                config.orchestrator_config(),
            ),
            inventory: InventoryService::new(inventory.clone()),
            reconciler: Reconciler::new(products, inventory, journal, config.reconciler_config()),
            bus,
            responder_config: config.responder_config(),
            responder: Mutex::new(None),
        }
    }

    /// Starts the inventory responder and the compensation listener.
    pub async fn start_background(&self) {
        let mut responder = self.responder.lock().await;
        if responder.is_none() {
            let inventory = self.inventory.store().clone();
            *responder = Some(
                InventorySagaResponder::new(
                    inventory,
                    self.bus.clone(),
                    self.responder_config.clone(),
                )
                .start(),
            );
        }
        drop(responder);
        self.orchestrator.start_listener().await;
    }

    /// Returns true while the inventory responder runs.
    pub async fn responder_running(&self) -> bool {
        self.responder
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops both background loops, letting in-flight messages finish.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.responder.lock().await.take() {
            handle.shutdown().await;
        }
        self.orchestrator.shutdown().await;
    }
}
