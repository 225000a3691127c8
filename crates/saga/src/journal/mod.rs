//! Persistent record of each product saga's state.
//!
//! The journal keeps the current state per product plus every applied
//! transition with its timestamp, so the window between a product's commit
//! and its inventory outcome can be observed from outside.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};
use store::Result;

use crate::state::SagaState;

pub use memory::InMemorySagaJournal;
pub use postgres::PostgresSagaJournal;

/// Current state of one product saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRecord {
    pub product_id: ProductId,
    pub state: SagaState,
    pub updated_at: DateTime<Utc>,
}

/// One applied state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaTransition {
    /// None for the first recorded state.
    pub from: Option<SagaState>,
    pub to: SagaState,
    pub at: DateTime<Utc>,
}

/// Outcome of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changed.
    Applied {
        from: Option<SagaState>,
        to: SagaState,
    },
    /// The saga was already in the requested state.
    Unchanged(SagaState),
    /// The state machine does not allow the move; nothing changed.
    Rejected { from: SagaState, to: SagaState },
}

impl Transition {
    /// Decides the outcome of moving from `current` to `to`.
    ///
    /// A product without a record accepts any first state.
    pub fn decide(current: Option<SagaState>, to: SagaState) -> Self {
        match current {
            None => Transition::Applied { from: None, to },
            Some(from) if from == to => Transition::Unchanged(from),
            Some(from) if from.can_transition_to(to) => Transition::Applied {
                from: Some(from),
                to,
            },
            Some(from) => Transition::Rejected { from, to },
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// Storage for saga state.
///
/// Each `transition` call is atomic per product: concurrent callers observe
/// a single ordered history.
#[async_trait]
pub trait SagaJournal: Send + Sync {
    /// Moves the product's saga to `to` if the state machine allows it.
    async fn transition(&self, product_id: ProductId, to: SagaState) -> Result<Transition>;

    /// Returns the current state of a product's saga.
    async fn current(&self, product_id: ProductId) -> Result<Option<SagaRecord>>;

    /// Returns every applied transition for a product, oldest first.
    async fn history(&self, product_id: ProductId) -> Result<Vec<SagaTransition>>;

    /// Returns every saga currently in `state`.
    async fn in_state(&self, state: SagaState) -> Result<Vec<SagaRecord>>;
}

/// Extension trait providing convenience methods for journals.
#[async_trait]
pub trait SagaJournalExt: SagaJournal {
    /// Records a transition from a background path.
    ///
    /// Rejections and journal faults are logged, never returned.
    async fn record(&self, product_id: ProductId, to: SagaState) -> Option<Transition> {
        match self.transition(product_id, to).await {
            Ok(transition @ Transition::Rejected { from, .. }) => {
                tracing::warn!(%product_id, %from, %to, "saga transition rejected");
                Some(transition)
            }
            Ok(transition) => {
                tracing::debug!(%product_id, %to, ?transition, "saga transition recorded");
                Some(transition)
            }
            Err(e) => {
                tracing::error!(%product_id, %to, error = %e, "failed to record saga transition");
                None
            }
        }
    }
}

// Blanket implementation for all SagaJournal implementations
impl<T: SagaJournal + ?Sized> SagaJournalExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_state_is_always_applied() {
        assert_eq!(
            Transition::decide(None, SagaState::ReservationConfirmed),
            Transition::Applied {
                from: None,
                to: SagaState::ReservationConfirmed
            }
        );
    }

    #[test]
    fn test_repeat_is_unchanged() {
        assert_eq!(
            Transition::decide(Some(SagaState::Compensated), SagaState::Compensated),
            Transition::Unchanged(SagaState::Compensated)
        );
    }

    #[test]
    fn test_backwards_move_is_rejected() {
        let outcome = Transition::decide(
            Some(SagaState::ReservationConfirmed),
            SagaState::ReservationPending,
        );
        assert!(!outcome.is_applied());
        assert_eq!(
            outcome,
            Transition::Rejected {
                from: SagaState::ReservationConfirmed,
                to: SagaState::ReservationPending
            }
        );
    }
}
