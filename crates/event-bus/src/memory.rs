use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, watch};

use crate::{
    BusError, Delivery, Message, Result,
    bus::{BusConfig, EventBus},
    message::partition_for_key,
};

#[derive(Debug, Default)]
struct InMemoryBusState {
    /// topic -> partitions -> messages, indexed by offset.
    topics: HashMap<String, Vec<Vec<Message>>>,
    /// (group, topic, partition) -> next offset.
    offsets: HashMap<(String, String, u32), i64>,
}

/// In-memory bus for tests and single-process deployments.
///
/// Behaves like the PostgreSQL implementation but keeps everything in
/// memory. Cloning yields another handle to the same log.
#[derive(Clone)]
pub struct InMemoryEventBus {
    state: Arc<RwLock<InMemoryBusState>>,
    config: BusConfig,
    signal: Arc<watch::Sender<u64>>,
    fail_on_publish: Arc<AtomicBool>,
    fail_on_fetch: Arc<AtomicBool>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::with_config(BusConfig::default())
    }
}

impl InMemoryEventBus {
    /// Creates an empty bus with one partition per topic.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BusConfig) -> Self {
        let (signal, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(InMemoryBusState::default())),
            config,
            signal: Arc::new(signal),
            fail_on_publish: Arc::new(AtomicBool::new(false)),
            fail_on_fetch: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every subsequent publish fail until reset.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent fetch fail until reset.
    pub fn set_fail_on_fetch(&self, fail: bool) {
        self.fail_on_fetch.store(fail, Ordering::SeqCst);
    }

    /// Returns every message of a topic, partition by partition.
    pub async fn messages(&self, topic: &str) -> Vec<Message> {
        let state = self.state.read().await;
        state
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the messages of a topic carrying the given key.
    pub async fn messages_with_key(&self, topic: &str, key: &str) -> Vec<Message> {
        self.messages(topic)
            .await
            .into_iter()
            .filter(|m| m.key == key)
            .collect()
    }

    fn check_partition(&self, topic: &str, partition: u32) -> Result<()> {
        if partition >= self.partition_count(topic) {
            return Err(BusError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, key: &str, value: Vec<u8>) -> Result<Delivery> {
        if self.fail_on_publish.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable("publish rejected".to_string()));
        }

        let partitions = self.partition_count(topic);
        let partition = partition_for_key(key, partitions);

        let delivery = {
            let mut state = self.state.write().await;
            let log = state
                .topics
                .entry(topic.to_string())
                .or_insert_with(|| vec![Vec::new(); partitions as usize]);
            let messages = &mut log[partition as usize];
            let offset = messages.len() as i64;
            messages.push(Message {
                topic: topic.to_string(),
                partition,
                offset,
                key: key.to_string(),
                value,
                timestamp: Utc::now(),
            });
            Delivery {
                topic: topic.to_string(),
                partition,
                offset,
            }
        };

        self.signal.send_modify(|n| *n = n.wrapping_add(1));
        metrics::counter!("bus_messages_published_total").increment(1);
        tracing::debug!(topic, key, partition, offset = delivery.offset, "message published");

        Ok(delivery)
    }

    fn partition_count(&self, _topic: &str) -> u32 {
        self.config.partitions.max(1)
    }

    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        offset: i64,
        max: usize,
    ) -> Result<Vec<Message>> {
        if self.fail_on_fetch.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable("fetch rejected".to_string()));
        }
        self.check_partition(topic, partition)?;
        let state = self.state.read().await;
        let Some(messages) = state
            .topics
            .get(topic)
            .and_then(|p| p.get(partition as usize))
        else {
            return Ok(Vec::new());
        };
        let start = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        Ok(messages.iter().skip(start).take(max).cloned().collect())
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: i64,
    ) -> Result<()> {
        self.check_partition(topic, partition)?;
        let mut state = self.state.write().await;
        state
            .offsets
            .insert((group.to_string(), topic.to_string(), partition), next_offset);
        Ok(())
    }

    async fn committed_offset(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
    ) -> Result<Option<i64>> {
        let state = self.state.read().await;
        Ok(state
            .offsets
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied())
    }

    async fn end_offset(&self, topic: &str, partition: u32) -> Result<i64> {
        self.check_partition(topic, partition)?;
        let state = self.state.read().await;
        Ok(state
            .topics
            .get(topic)
            .and_then(|p| p.get(partition as usize))
            .map(|m| m.len() as i64)
            .unwrap_or(0))
    }

    fn publish_signal(&self) -> watch::Receiver<u64> {
        self.signal.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBusExt;

    #[tokio::test]
    async fn publish_assigns_sequential_offsets() {
        let bus = InMemoryEventBus::new();

        let first = bus.publish("product", "k", b"1".to_vec()).await.unwrap();
        let second = bus.publish("product", "k", b"2".to_vec()).await.unwrap();

        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
        assert_eq!(bus.end_offset("product", 0).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn fetch_returns_messages_in_publish_order() {
        let bus = InMemoryEventBus::new();
        for i in 0..5 {
            bus.publish("product", "k", vec![i]).await.unwrap();
        }

        let messages = bus.fetch("product", 0, 2, 10).await.unwrap();
        let values: Vec<u8> = messages.iter().map(|m| m.value[0]).collect();
        assert_eq!(values, vec![2, 3, 4]);

        let limited = bus.fetch("product", 0, 0, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn fetch_from_unknown_topic_is_empty() {
        let bus = InMemoryEventBus::new();
        assert!(bus.fetch("nothing", 0, 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_partition_is_rejected() {
        let bus = InMemoryEventBus::new();
        let result = bus.fetch("product", 3, 0, 10).await;
        assert!(matches!(result, Err(BusError::UnknownPartition { .. })));
    }

    #[tokio::test]
    async fn commit_tracks_offsets_per_group() {
        let bus = InMemoryEventBus::new();
        bus.publish("product", "k", b"x".to_vec()).await.unwrap();

        assert_eq!(bus.committed_offset("a", "product", 0).await.unwrap(), None);
        bus.commit("a", "product", 0, 1).await.unwrap();
        assert_eq!(bus.committed_offset("a", "product", 0).await.unwrap(), Some(1));
        assert_eq!(bus.committed_offset("b", "product", 0).await.unwrap(), None);

        assert_eq!(bus.lag("a", "product").await.unwrap(), 0);
        assert_eq!(bus.lag("b", "product").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failing_publish_stores_nothing() {
        let bus = InMemoryEventBus::new();
        bus.set_fail_on_publish(true);

        let result = bus.publish("product", "k", b"x".to_vec()).await;
        assert!(matches!(result, Err(BusError::Unavailable(_))));
        assert_eq!(bus.topic_len("product").await.unwrap(), 0);

        bus.set_fail_on_publish(false);
        bus.publish("product", "k", b"x".to_vec()).await.unwrap();
        assert_eq!(bus.topic_len("product").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_key_lands_in_same_partition() {
        let bus = InMemoryEventBus::with_config(BusConfig {
            partitions: 4,
            ..BusConfig::default()
        });

        let a = bus.publish("product", "product-created", vec![]).await.unwrap();
        let b = bus.publish("product", "product-created", vec![]).await.unwrap();
        assert_eq!(a.partition, b.partition);
        assert_eq!(b.offset, a.offset + 1);
        assert_eq!(bus.topic_len("product").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn publish_bumps_signal() {
        let bus = InMemoryEventBus::new();
        let mut signal = bus.publish_signal();

        bus.publish("product", "k", vec![]).await.unwrap();
        assert!(signal.has_changed().unwrap());
        assert_eq!(*signal.borrow_and_update(), 1);
    }
}
