//! Consumer-group reader and the background consume loop.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::{EventBus, Message, Result};

/// Settings for one consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Consumer group whose committed offsets are used and advanced.
    pub group: String,
    /// Upper bound on how long the consumer sleeps before polling again.
    pub poll_interval: Duration,
    /// Maximum messages fetched from a partition per poll.
    pub batch_size: usize,
    /// Pause after a failed fetch or commit.
    pub error_backoff: Duration,
}

impl ConsumerConfig {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Self::default()
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: "default".to_string(),
            poll_interval: Duration::from_millis(100),
            batch_size: 64,
            error_backoff: Duration::from_millis(500),
        }
    }
}

/// Reads a topic on behalf of a consumer group.
///
/// Positions start at the group's committed offsets (earliest when the group
/// has never committed) and advance as messages are handed out. Committing is
/// explicit, so a message handed out but not committed is delivered again to
/// the next consumer created for the group.
pub struct Consumer<B: EventBus> {
    bus: B,
    topic: String,
    config: ConsumerConfig,
    positions: Option<Vec<i64>>,
    buffer: VecDeque<Message>,
    signal: watch::Receiver<u64>,
}

impl<B: EventBus> Consumer<B> {
    /// Creates a consumer for `topic`.
    pub fn new(bus: B, topic: impl Into<String>, config: ConsumerConfig) -> Self {
        let signal = bus.publish_signal();
        Self {
            bus,
            topic: topic.into(),
            config,
            positions: None,
            buffer: VecDeque::new(),
            signal,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn group(&self) -> &str {
        &self.config.group
    }

    async fn load_positions(&mut self) -> Result<()> {
        if self.positions.is_some() {
            return Ok(());
        }
        let mut positions = Vec::new();
        for partition in 0..self.bus.partition_count(&self.topic) {
            let committed = self
                .bus
                .committed_offset(&self.config.group, &self.topic, partition)
                .await?;
            positions.push(committed.unwrap_or(0));
        }
        self.positions = Some(positions);
        Ok(())
    }

    /// Returns the next message if one is available, without waiting.
    pub async fn poll(&mut self) -> Result<Option<Message>> {
        if let Some(message) = self.buffer.pop_front() {
            return Ok(Some(message));
        }

        self.load_positions().await?;
        let Some(positions) = self.positions.as_mut() else {
            return Ok(None);
        };

        for (partition, position) in positions.iter_mut().enumerate() {
            let messages = self
                .bus
                .fetch(
                    &self.topic,
                    partition as u32,
                    *position,
                    self.config.batch_size,
                )
                .await?;
            if let Some(last) = messages.last() {
                *position = last.next_offset();
            }
            self.buffer.extend(messages);
        }

        Ok(self.buffer.pop_front())
    }

    /// Waits for the next message.
    ///
    /// Returns `Ok(None)` once `shutdown` flips to true or its sender is gone.
    pub async fn recv(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<Option<Message>> {
        loop {
            if *shutdown.borrow() {
                return Ok(None);
            }
            if let Some(message) = self.poll().await? {
                return Ok(Some(message));
            }

            let poll_interval = self.config.poll_interval;
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(None);
                    }
                }
                _ = wait_for_publish(&mut self.signal, poll_interval) => {}
            }
        }
    }

    /// Commits everything up to and including `message` for this group.
    pub async fn commit(&self, message: &Message) -> Result<()> {
        self.bus
            .commit(
                &self.config.group,
                &message.topic,
                message.partition,
                message.next_offset(),
            )
            .await
    }
}

async fn wait_for_publish(signal: &mut watch::Receiver<u64>, poll_interval: Duration) {
    match tokio::time::timeout(poll_interval, signal.changed()).await {
        Ok(Ok(())) | Err(_) => {}
        // Sender gone: fall back to plain interval polling.
        Ok(Err(_)) => tokio::time::sleep(poll_interval).await,
    }
}

/// Processes messages delivered by a consumer loop.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    type Error: std::fmt::Display + Send;

    /// Handles one message. Errors are logged by the loop; the message is
    /// committed either way.
    async fn handle(&self, message: &Message) -> std::result::Result<(), Self::Error>;
}

/// Handle to a running consume loop.
pub struct ConsumerHandle {
    topic: String,
    group: String,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Returns true if the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Asks the loop to stop and waits for it. A message being handled is
    /// finished and committed first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(topic = %self.topic, group = %self.group, error = %e, "consumer task failed");
        }
    }
}

/// Starts a background task that feeds every message of the consumer's
/// topic to `handler`, one at a time.
pub fn spawn_consumer<B, H>(consumer: Consumer<B>, handler: H) -> ConsumerHandle
where
    B: EventBus + 'static,
    H: MessageHandler,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let topic = consumer.topic().to_string();
    let group = consumer.group().to_string();
    let span = tracing::info_span!("consumer", topic = %topic, group = %group);

    let task = tokio::spawn(run(consumer, handler, shutdown_rx).instrument(span));

    ConsumerHandle {
        topic,
        group,
        shutdown: shutdown_tx,
        task,
    }
}

/// Blocking receive loop: one message in flight at a time.
///
/// Handler errors are logged and the offset is still committed, so a failing
/// message is not redelivered by this loop. Fetch and commit errors are
/// logged and retried after a back-off.
pub async fn run<B, H>(mut consumer: Consumer<B>, handler: H, mut shutdown: watch::Receiver<bool>)
where
    B: EventBus,
    H: MessageHandler,
{
    tracing::info!("consumer started");
    let backoff = consumer.config.error_backoff;

    loop {
        let message = match consumer.recv(&mut shutdown).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch messages");
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(backoff) => {}
                }
                continue;
            }
        };

        metrics::counter!("bus_messages_consumed_total", "topic" => message.topic.clone())
            .increment(1);

        if let Err(e) = handler.handle(&message).await {
            metrics::counter!("bus_handler_errors_total", "topic" => message.topic.clone())
                .increment(1);
            tracing::warn!(
                key = %message.key,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "failed to handle message"
            );
        }

        if let Err(e) = consumer.commit(&message).await {
            tracing::warn!(offset = message.offset, error = %e, "failed to commit offset");
        }
    }

    tracing::info!("consumer stopped");
}
