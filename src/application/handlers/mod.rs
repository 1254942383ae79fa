//! Application handlers.
//!
//! Command handlers that wrap the engine with persistence.

mod send_coach_message;

pub use send_coach_message::{
    SendCoachMessageCommand, SendCoachMessageError, SendCoachMessageHandler,
};
