//! Coaching engine configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::application::MAX_REGENERATIONS;

/// Coaching engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Regenerations allowed after a failed validation
    #[serde(default = "default_max_regenerations")]
    pub max_regenerations: u32,

    /// Ask the model for extra threads and observations
    #[serde(default = "default_enrichment_enabled")]
    pub enrichment_enabled: bool,

    /// Prior messages required before enrichment runs
    #[serde(default = "default_min_history")]
    pub min_history_for_enrichment: usize,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_regenerations > MAX_REGENERATIONS {
            return Err(ValidationError::RegenerationBudgetTooLarge(
                self.max_regenerations,
                MAX_REGENERATIONS,
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_regenerations: default_max_regenerations(),
            enrichment_enabled: default_enrichment_enabled(),
            min_history_for_enrichment: default_min_history(),
        }
    }
}

fn default_max_regenerations() -> u32 {
    MAX_REGENERATIONS
}

fn default_enrichment_enabled() -> bool {
    true
}

fn default_min_history() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_regenerations, 2);
        assert!(config.enrichment_enabled);
        assert_eq!(config.min_history_for_enrichment, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_regeneration_budget_above_two() {
        let config = EngineConfig {
            max_regenerations: 3,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::RegenerationBudgetTooLarge(3, 2))
        ));
    }
}
