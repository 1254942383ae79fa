//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, scores, errors, state machine)
//! - `coaching` - Phases, threads, observations, scoring, detection and validation

pub mod coaching;
pub mod foundation;
