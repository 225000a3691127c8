use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::ProductId;
use store::Result;
use tokio::sync::RwLock;

use super::{SagaJournal, SagaRecord, SagaTransition, Transition};
use crate::state::SagaState;

#[derive(Debug, Clone)]
struct Entry {
    record: SagaRecord,
    history: Vec<SagaTransition>,
}

/// In-memory saga journal for testing and single-process runs.
#[derive(Debug, Clone, Default)]
pub struct InMemorySagaJournal {
    entries: Arc<RwLock<HashMap<ProductId, Entry>>>,
}

impl InMemorySagaJournal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SagaJournal for InMemorySagaJournal {
    async fn transition(&self, product_id: ProductId, to: SagaState) -> Result<Transition> {
        let mut entries = self.entries.write().await;
        let current = entries.get(&product_id).map(|e| e.record.state);
        let outcome = Transition::decide(current, to);

        if let Transition::Applied { from, to } = outcome {
            let now = Utc::now();
            let entry = entries.entry(product_id).or_insert_with(|| Entry {
                record: SagaRecord {
                    product_id,
                    state: to,
                    updated_at: now,
                },
                history: Vec::new(),
            });
            entry.record.state = to;
            entry.record.updated_at = now;
            entry.history.push(SagaTransition { from, to, at: now });
        }

        Ok(outcome)
    }

    async fn current(&self, product_id: ProductId) -> Result<Option<SagaRecord>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&product_id)
            .map(|e| e.record.clone()))
    }

    async fn history(&self, product_id: ProductId) -> Result<Vec<SagaTransition>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&product_id)
            .map(|e| e.history.clone())
            .unwrap_or_default())
    }

    async fn in_state(&self, state: SagaState) -> Result<Vec<SagaRecord>> {
        let mut records: Vec<_> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.record.state == state)
            .map(|e| e.record.clone())
            .collect();
        records.sort_by_key(|r| r.updated_at);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_happy_path_history() {
        let journal = InMemorySagaJournal::new();
        let product_id = ProductId::new();

        journal.transition(product_id, SagaState::Created).await.unwrap();
        journal
            .transition(product_id, SagaState::ReservationPending)
            .await
            .unwrap();
        journal
            .transition(product_id, SagaState::ReservationConfirmed)
            .await
            .unwrap();

        let history = journal.history(product_id).await.unwrap();
        let states: Vec<_> = history.iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(
            states,
            vec![
                (None, SagaState::Created),
                (Some(SagaState::Created), SagaState::ReservationPending),
                (
                    Some(SagaState::ReservationPending),
                    SagaState::ReservationConfirmed
                ),
            ]
        );
        assert_eq!(
            journal.current(product_id).await.unwrap().unwrap().state,
            SagaState::ReservationConfirmed
        );
    }

    #[tokio::test]
    async fn test_rejected_transition_changes_nothing() {
        let journal = InMemorySagaJournal::new();
        let product_id = ProductId::new();

        journal
            .transition(product_id, SagaState::Compensated)
            .await
            .unwrap();
        let outcome = journal
            .transition(product_id, SagaState::ReservationPending)
            .await
            .unwrap();

        assert!(matches!(outcome, Transition::Rejected { .. }));
        assert_eq!(journal.history(product_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_transition_is_unchanged() {
        let journal = InMemorySagaJournal::new();
        let product_id = ProductId::new();

        journal.transition(product_id, SagaState::Created).await.unwrap();
        let outcome = journal.transition(product_id, SagaState::Created).await.unwrap();

        assert_eq!(outcome, Transition::Unchanged(SagaState::Created));
        assert_eq!(journal.history(product_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_in_state_filters() {
        let journal = InMemorySagaJournal::new();
        let pending = ProductId::new();
        let created = ProductId::new();

        journal.transition(pending, SagaState::Created).await.unwrap();
        journal
            .transition(pending, SagaState::ReservationPending)
            .await
            .unwrap();
        journal.transition(created, SagaState::Created).await.unwrap();

        let records = journal
            .in_state(SagaState::ReservationPending)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].product_id, pending);
    }

    #[tokio::test]
    async fn test_unknown_product_has_no_record() {
        let journal = InMemorySagaJournal::new();
        let product_id = ProductId::new();
        assert!(journal.current(product_id).await.unwrap().is_none());
        assert!(journal.history(product_id).await.unwrap().is_empty());
    }
}
