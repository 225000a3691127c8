//! Event bus client.
//!
//! A publish/consume abstraction over a durable, partitioned log:
//! - messages are appended to a partition chosen from their key
//! - consumers read one message at a time in per-partition publish order
//! - progress is committed per consumer group after each message is handled
//!
//! Delivery is at-least-once: anything not yet committed is delivered again
//! to the next consumer of the same group.

pub mod bus;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod message;
pub mod postgres;

pub use bus::{BusConfig, EventBus, EventBusExt};
pub use consumer::{Consumer, ConsumerConfig, ConsumerHandle, MessageHandler, spawn_consumer};
pub use error::{BusError, Result};
pub use memory::InMemoryEventBus;
pub use message::{Delivery, Message, partition_for_key};
pub use postgres::PostgresEventBus;
