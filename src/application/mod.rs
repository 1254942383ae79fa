//! Application layer - Engine and command handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! The engine runs one coaching turn; handlers add loading and saving.

pub mod engine;
pub mod handlers;

pub use engine::{CoachTurn, CoachingEngine, EngineError, TurnInput, MAX_REGENERATIONS};
pub use handlers::{SendCoachMessageCommand, SendCoachMessageError, SendCoachMessageHandler};
