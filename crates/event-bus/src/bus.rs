use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{Delivery, Message, Result};

/// Broker-side settings shared by the bus implementations.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Number of partitions per topic.
    pub partitions: u32,
    /// How long a publish may wait for the broker to acknowledge.
    pub publish_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            partitions: 1,
            publish_timeout: Duration::from_secs(10),
        }
    }
}

/// Core trait for bus implementations.
///
/// A bus stores messages in per-topic partitions and remembers, per consumer
/// group, the next offset to read from each partition. All implementations
/// must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Appends a message and returns once the broker has durably stored it.
    ///
    /// Messages with the same key always land in the same partition, so
    /// their relative order is preserved for consumers.
    async fn publish(&self, topic: &str, key: &str, value: Vec<u8>) -> Result<Delivery>;

    /// Number of partitions of a topic.
    fn partition_count(&self, topic: &str) -> u32;

    /// Reads up to `max` messages starting at `offset`, oldest first.
    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        offset: i64,
        max: usize,
    ) -> Result<Vec<Message>>;

    /// Records that `group` has handled everything before `next_offset`.
    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: i64,
    ) -> Result<()>;

    /// The next offset `group` will read, or None if it never committed.
    async fn committed_offset(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
    ) -> Result<Option<i64>>;

    /// Offset the next published message in the partition will receive.
    async fn end_offset(&self, topic: &str, partition: u32) -> Result<i64>;

    /// Watch channel bumped after every publish made through this handle.
    ///
    /// Consumers wait on it instead of spinning; they still poll on an
    /// interval to pick up messages published by other processes.
    fn publish_signal(&self) -> watch::Receiver<u64>;
}

/// Extension trait providing convenience methods for buses.
#[async_trait]
pub trait EventBusExt: EventBus {
    /// Number of messages in `topic` that `group` has not committed yet.
    async fn lag(&self, group: &str, topic: &str) -> Result<i64> {
        let mut lag = 0;
        for partition in 0..self.partition_count(topic) {
            let end = self.end_offset(topic, partition).await?;
            let committed = self
                .committed_offset(group, topic, partition)
                .await?
                .unwrap_or(0);
            lag += (end - committed).max(0);
        }
        Ok(lag)
    }

    /// Total number of messages ever published to `topic`.
    async fn topic_len(&self, topic: &str) -> Result<i64> {
        let mut len = 0;
        for partition in 0..self.partition_count(topic) {
            len += self.end_offset(topic, partition).await?;
        }
        Ok(len)
    }
}

// Blanket implementation for all EventBus implementations
impl<T: EventBus + ?Sized> EventBusExt for T {}
