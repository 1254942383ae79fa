//! State machine trait for ordered lifecycle enums.
//!
//! Conversation phases implement this so that every phase change goes
//! through one validated path instead of ad-hoc assignments.

use super::ValidationError;

/// Trait for enums that represent state machines.
///
/// Implementors declare their valid targets; validated transitions and the
/// forward-step helper come for free.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Returns the single forward successor for linear machines.
    ///
    /// `None` for terminal states and for states with more than one target.
    fn step(&self) -> Option<Self> {
        match self.valid_transitions().as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
