use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ProductId;
use sqlx::{PgPool, Row, postgres::PgRow};
use store::{Result, StoreConfig, StoreError};
use uuid::Uuid;

use super::{SagaJournal, SagaRecord, SagaTransition, Transition};
use crate::state::SagaState;

/// PostgreSQL-backed saga journal.
///
/// Current states live in `product_sagas`, applied transitions in
/// `saga_transitions`. A transition locks the product's row for the
/// duration of its transaction.
#[derive(Clone)]
pub struct PostgresSagaJournal {
    pool: PgPool,
    config: StoreConfig,
}

fn parse_state(raw: &str) -> Result<SagaState> {
    raw.parse()
        .map_err(|e: crate::state::ParseSagaStateError| StoreError::Corrupt(e.to_string()))
}

fn row_to_record(row: PgRow) -> Result<SagaRecord> {
    Ok(SagaRecord {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        state: parse_state(row.try_get("state")?)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn row_to_transition(row: PgRow) -> Result<SagaTransition> {
    let from: Option<&str> = row.try_get("from_state")?;
    Ok(SagaTransition {
        from: from.map(parse_state).transpose()?,
        to: parse_state(row.try_get("to_state")?)?,
        at: row.try_get::<DateTime<Utc>, _>("at")?,
    })
}

impl PostgresSagaJournal {
    pub fn new(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    async fn apply(&self, product_id: ProductId, to: SagaState) -> Result<Transition> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let inserted = sqlx::query(
            r#"
            INSERT INTO product_sagas (product_id, state, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id) DO NOTHING
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(to.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let outcome = if inserted == 1 {
            Transition::Applied { from: None, to }
        } else {
            let current: String =
                sqlx::query_scalar("SELECT state FROM product_sagas WHERE product_id = $1 FOR UPDATE")
                    .bind(product_id.as_uuid())
                    .fetch_one(&mut *tx)
                    .await?;
            let outcome = Transition::decide(Some(parse_state(&current)?), to);

            if outcome.is_applied() {
                sqlx::query("UPDATE product_sagas SET state = $2, updated_at = $3 WHERE product_id = $1")
                    .bind(product_id.as_uuid())
                    .bind(to.as_str())
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
            }
            outcome
        };

        if let Transition::Applied { from, to } = outcome {
            sqlx::query(
                r#"
                INSERT INTO saga_transitions (product_id, from_state, to_state, at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(from.map(|s| s.as_str()))
            .bind(to.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

#[async_trait]
impl SagaJournal for PostgresSagaJournal {
    async fn transition(&self, product_id: ProductId, to: SagaState) -> Result<Transition> {
        self.config
            .run("saga.transition", self.apply(product_id, to))
            .await
    }

    async fn current(&self, product_id: ProductId) -> Result<Option<SagaRecord>> {
        self.config
            .run("saga.current", async {
                sqlx::query(
                    "SELECT product_id, state, updated_at FROM product_sagas WHERE product_id = $1",
                )
                .bind(product_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
                .map(row_to_record)
                .transpose()
            })
            .await
    }

    async fn history(&self, product_id: ProductId) -> Result<Vec<SagaTransition>> {
        self.config
            .run("saga.history", async {
                sqlx::query(
                    r#"
                    SELECT from_state, to_state, at
                    FROM saga_transitions
                    WHERE product_id = $1
                    ORDER BY id
                    "#,
                )
                .bind(product_id.as_uuid())
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(row_to_transition)
                .collect()
            })
            .await
    }

    async fn in_state(&self, state: SagaState) -> Result<Vec<SagaRecord>> {
        self.config
            .run("saga.in_state", async {
                sqlx::query(
                    r#"
                    SELECT product_id, state, updated_at
                    FROM product_sagas
                    WHERE state = $1
                    ORDER BY updated_at
                    "#,
                )
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(row_to_record)
                .collect()
            })
            .await
    }
}
