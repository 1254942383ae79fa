//! AI provider configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// AI provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Backend serving completions
    #[serde(default)]
    pub provider: AiProvider,

    /// API key, required for OpenAI
    pub api_key: Option<Secret<String>>,

    /// Model name; defaults per provider
    pub model: Option<String>,

    /// Override for the provider endpoint
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Transport retries on transient failures
    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// Extra attempts when the model output does not parse
    #[serde(default = "default_parse_retries")]
    pub parse_retries: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// AI provider type
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    OpenAI,
    Ollama,
    /// Scripted offline provider
    Mock,
}

impl AiConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Model to request, falling back to the provider default.
    pub fn model(&self) -> String {
        match (&self.model, self.provider) {
            (Some(model), _) if !model.trim().is_empty() => model.trim().to_string(),
            (_, AiProvider::OpenAI) => "gpt-4o-mini".to_string(),
            (_, AiProvider::Ollama) => "llama3.1".to_string(),
            (_, AiProvider::Mock) => "mock-model-1".to_string(),
        }
    }

    /// Check if an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }

    /// Validate AI configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.provider == AiProvider::OpenAI && !self.has_api_key() {
            return Err(ValidationError::MissingRequired("AI__API_KEY"));
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidTemperature(self.temperature));
        }

        if self.max_tokens == 0 {
            return Err(ValidationError::InvalidMaxTokens);
        }

        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            api_key: None,
            model: None,
            base_url: None,
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            parse_retries: default_parse_retries(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

fn default_retries() -> u32 {
    3
}

fn default_parse_retries() -> u32 {
    1
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}
