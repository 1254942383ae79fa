//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Temperature {0} outside 0.0..=2.0")]
    InvalidTemperature(f32),

    #[error("max_tokens must be positive")]
    InvalidMaxTokens,

    #[error("Regeneration budget {0} exceeds the maximum of {1}")]
    RegenerationBudgetTooLarge(u32, u32),

    #[error("State directory must not be empty")]
    EmptyStateDir,

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}
