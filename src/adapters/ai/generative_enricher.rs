//! Generative Pattern Enricher - model-assisted pattern detection.
//!
//! Asks the generation service for threads and observations the rules miss.
//! Every failure is logged and reported as `None`, so a turn never fails
//! because enrichment did.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::coaching::{
    ChatMessage, ConversationState, EnrichmentReply, InstructionTemplates, PatternAnalysis,
};
use crate::ports::{ExpectedShape, GenerationRequest, PatternEnricher, ReplyGenerator};

/// Prior messages required before enrichment runs.
pub const DEFAULT_MIN_HISTORY: usize = 2;

pub struct GenerativePatternEnricher {
    generator: Arc<dyn ReplyGenerator>,
    templates: InstructionTemplates,
    min_history: usize,
}

impl GenerativePatternEnricher {
    pub fn new(generator: Arc<dyn ReplyGenerator>, templates: InstructionTemplates) -> Self {
        Self {
            generator,
            templates,
            min_history: DEFAULT_MIN_HISTORY,
        }
    }

    pub fn with_min_history(mut self, min_history: usize) -> Self {
        self.min_history = min_history;
        self
    }
}

#[async_trait]
impl PatternEnricher for GenerativePatternEnricher {
    async fn try_enrich(
        &self,
        message: &str,
        history: &[ChatMessage],
        state: &ConversationState,
    ) -> Option<PatternAnalysis> {
        if history.len() < self.min_history {
            tracing::debug!(
                history = history.len(),
                min_history = self.min_history,
                "Skipping enrichment: not enough history"
            );
            return None;
        }

        let request = GenerationRequest::new(
            self.templates.enrichment_instructions(),
            self.templates.enrichment_request(message, history, state),
            ExpectedShape::PatternAnalysis,
        );

        let output = match self.generator.generate(request).await {
            Ok(output) => output,
            Err(err) if err.is_malformed_output() => {
                tracing::debug!(error = %err, "Enrichment output unusable");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Enrichment call failed");
                return None;
            }
        };

        match EnrichmentReply::from_value(output.value) {
            Ok(reply) => Some(reply.into_analysis()),
            Err(err) => {
                tracing::debug!(error = %err, "Enrichment reply did not match shape");
                None
            }
        }
    }
}
