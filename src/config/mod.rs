//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `DIALOGUE_COACH` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use dialogue_coach::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Using model {}", config.ai.model());
//! ```

mod ai;
mod engine;
mod error;
mod logging;
mod storage;

pub use ai::{AiConfig, AiProvider};
pub use engine::EngineConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use storage::StorageConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment loads. Load using
/// [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// AI provider configuration (OpenAI/Ollama/mock)
    #[serde(default)]
    pub ai: AiConfig,

    /// Coaching engine tuning
    #[serde(default)]
    pub engine: EngineConfig,

    /// Conversation state persistence
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `DIALOGUE_COACH` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `DIALOGUE_COACH__AI__PROVIDER=ollama` -> `ai.provider = ollama`
    /// - `DIALOGUE_COACH__ENGINE__MAX_REGENERATIONS=1` -> `engine.max_regenerations = 1`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("DIALOGUE_COACH")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.ai.validate()?;
        self.engine.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
