//! Dialogue Coach - conversational coaching core
//!
//! This crate drives a coaching conversation through a fixed set of phases,
//! tracking the threads and observations that surface along the way and
//! validating every model-generated reply before it reaches the user.
//!
//! The layout is hexagonal: `domain` holds the pure coaching logic, `ports`
//! the seams to model providers and persistence, `adapters` the concrete
//! implementations, and `application` the turn orchestration.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
