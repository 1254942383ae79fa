//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, value objects, the state machine trait and
//! error types used across the coaching domain.

mod errors;
mod ids;
mod state_machine;
mod unit_score;

pub use errors::ValidationError;
pub use ids::{ObservationId, SessionId, ThreadId};
pub use state_machine::StateMachine;
pub use unit_score::UnitScore;
