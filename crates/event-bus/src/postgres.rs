use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::{PgPool, Row, postgres::PgRow};
use tokio::sync::watch;

use crate::{
    BusError, Delivery, Message, Result,
    bus::{BusConfig, EventBus},
    message::partition_for_key,
};

/// PostgreSQL-backed bus.
///
/// Messages live in `bus_messages`, one row per offset; consumer progress
/// lives in `consumer_offsets`. Appends to a partition are serialized with a
/// transaction-scoped advisory lock so offsets stay dense.
#[derive(Clone)]
pub struct PostgresEventBus {
    pool: PgPool,
    config: BusConfig,
    signal: Arc<watch::Sender<u64>>,
}

impl PostgresEventBus {
    /// Creates a new PostgreSQL bus.
    pub fn new(pool: PgPool, config: BusConfig) -> Self {
        let (signal, _) = watch::channel(0);
        Self {
            pool,
            config,
            signal: Arc::new(signal),
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_message(row: PgRow) -> Result<Message> {
        Ok(Message {
            topic: row.try_get("topic")?,
            partition: row.try_get::<i32, _>("partition_no")? as u32,
            offset: row.try_get("msg_offset")?,
            key: row.try_get("key")?,
            value: row.try_get("value")?,
            timestamp: row.try_get::<DateTime<Utc>, _>("published_at")?,
        })
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

    async fn append(
        &self,
        topic: &str,
        partition: u32,
        key: &str,
        value: Vec<u8>,
    ) -> Result<Delivery> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), $2)")
            .bind(topic)
            .bind(partition as i32)
            .execute(&mut *tx)
            .await?;

        let offset: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(msg_offset) + 1, 0)
            FROM bus_messages
            WHERE topic = $1 AND partition_no = $2
            "#,
        )
        .bind(topic)
        .bind(partition as i32)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO bus_messages (topic, partition_no, msg_offset, key, value, published_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(topic)
        .bind(partition as i32)
        .bind(offset)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Delivery {
            topic: topic.to_string(),
            partition,
            offset,
        })
    }
}

#[async_trait]
impl EventBus for PostgresEventBus {
    async fn publish(&self, topic: &str, key: &str, value: Vec<u8>) -> Result<Delivery> {
        let partition = partition_for_key(key, self.partition_count(topic));
        let timeout = self.config.publish_timeout;

        let delivery = tokio::time::timeout(timeout, self.append(topic, partition, key, value))
            .await
            .map_err(|_| BusError::Timeout {
                topic: topic.to_string(),
                after: timeout,
            })??;

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
        self.check_partition(topic, partition)?;

        sqlx::query(
            r#"
            SELECT topic, partition_no, msg_offset, key, value, published_at
            FROM bus_messages
            WHERE topic = $1 AND partition_no = $2 AND msg_offset >= $3
            ORDER BY msg_offset ASC
            LIMIT $4
            "#,
        )
        .bind(topic)
        .bind(partition as i32)
        .bind(offset)
        .bind(max as i64)
        .fetch(&self.pool)
        .map_err(BusError::from)
        .and_then(|row| async move { Self::row_to_message(row) })
        .try_collect()
        .await
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: i64,
    ) -> Result<()> {
        self.check_partition(topic, partition)?;

        sqlx::query(
            r#"
            INSERT INTO consumer_offsets (group_id, topic, partition_no, next_offset, committed_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (group_id, topic, partition_no) DO UPDATE SET
                next_offset = EXCLUDED.next_offset,
                committed_at = EXCLUDED.committed_at
            "#,
        )
        .bind(group)
        .bind(topic)
        .bind(partition as i32)
        .bind(next_offset)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn committed_offset(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
    ) -> Result<Option<i64>> {
        let offset: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT next_offset
            FROM consumer_offsets
            WHERE group_id = $1 AND topic = $2 AND partition_no = $3
            "#,
        )
        .bind(group)
        .bind(topic)
        .bind(partition as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(offset)
    }

    async fn end_offset(&self, topic: &str, partition: u32) -> Result<i64> {
        self.check_partition(topic, partition)?;

        let offset: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(msg_offset) + 1, 0)
            FROM bus_messages
            WHERE topic = $1 AND partition_no = $2
            "#,
        )
        .bind(topic)
        .bind(partition as i32)
        .fetch_one(&self.pool)
        .await?;

        Ok(offset)
    }

    fn publish_signal(&self) -> watch::Receiver<u64> {
        self.signal.subscribe()
    }
}
