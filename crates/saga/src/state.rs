//! Product saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a product's creation saga.
///
/// State transitions:
/// ```text
/// Created ──► ReservationPending ──┬──► ReservationConfirmed ──┐
///    │                             └───────────────────────────┴──► Compensated
///    └──► ReservationConfirmed | Compensated
/// ```
///
/// The outcome listeners may observe a result before the orchestrator has
/// recorded `ReservationPending`, so `Created` may move straight to either
/// outcome. A failure always wins, even over a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// The product is committed; its event may not be published yet.
    #[default]
    Created,

    /// The event is published and the inventory outcome is awaited.
    ReservationPending,

    /// Inventory was created for the product.
    ReservationConfirmed,

    /// Inventory creation failed and the product was deleted (terminal state).
    Compensated,
}

impl SagaState {
    /// All states, in lifecycle order.
    pub const ALL: [SagaState; 4] = [
        SagaState::Created,
        SagaState::ReservationPending,
        SagaState::ReservationConfirmed,
        SagaState::Compensated,
    ];

    /// Returns true if the saga may move from `self` to `next`.
    ///
    /// Staying in the same state is not a transition and returns false.
    pub fn can_transition_to(&self, next: SagaState) -> bool {
        use SagaState::*;
        matches!(
            (self, next),
            (Created, ReservationPending | ReservationConfirmed | Compensated)
                | (ReservationPending, ReservationConfirmed | Compensated)
                | (ReservationConfirmed, Compensated)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Compensated)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Created => "Created",
            SagaState::ReservationPending => "ReservationPending",
            SagaState::ReservationConfirmed => "ReservationConfirmed",
            SagaState::Compensated => "Compensated",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown state name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown saga state: {0}")]
pub struct ParseSagaStateError(pub String);

impl std::str::FromStr for SagaState {
    type Err = ParseSagaStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SagaState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ParseSagaStateError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_created() {
        assert_eq!(SagaState::default(), SagaState::Created);
    }

    #[test]
    fn test_transitions_from_created() {
        assert!(SagaState::Created.can_transition_to(SagaState::ReservationPending));
        assert!(SagaState::Created.can_transition_to(SagaState::ReservationConfirmed));
        assert!(SagaState::Created.can_transition_to(SagaState::Compensated));
        assert!(!SagaState::Created.can_transition_to(SagaState::Created));
    }

    #[test]
    fn test_transitions_from_pending() {
        let pending = SagaState::ReservationPending;
        assert!(pending.can_transition_to(SagaState::ReservationConfirmed));
        assert!(pending.can_transition_to(SagaState::Compensated));
        assert!(!pending.can_transition_to(SagaState::Created));
    }

    #[test]
    fn test_failure_overrides_confirmation() {
        let confirmed = SagaState::ReservationConfirmed;
        assert!(confirmed.can_transition_to(SagaState::Compensated));
        assert!(!confirmed.can_transition_to(SagaState::ReservationPending));
        assert!(!confirmed.can_transition_to(SagaState::Created));
    }

    #[test]
    fn test_compensated_is_terminal() {
        for next in SagaState::ALL {
            assert!(!SagaState::Compensated.can_transition_to(next));
        }
        assert!(SagaState::Compensated.is_terminal());
        assert!(!SagaState::ReservationConfirmed.is_terminal());
    }

    #[test]
    fn test_parse_round_trips_names() {
        for state in SagaState::ALL {
            assert_eq!(state.to_string().parse::<SagaState>(), Ok(state));
        }
        assert!("Running".parse::<SagaState>().is_err());
    }

    #[test]
    fn test_serialization() {
        let state = SagaState::ReservationPending;
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "\"ReservationPending\"");
        let deserialized: SagaState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
