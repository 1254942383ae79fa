//! Pattern Enricher Port - optional model-assisted pattern detection.
//!
//! The rule-based detector is always available; an enricher can add threads
//! and observations on top. Enrichment is best effort: implementations
//! swallow their own failures and report `None`.

use async_trait::async_trait;

use crate::domain::coaching::{ChatMessage, ConversationState, PatternAnalysis};

#[async_trait]
pub trait PatternEnricher: Send + Sync {
    /// Returns extra findings for `message`, or `None` when unavailable.
    async fn try_enrich(
        &self,
        message: &str,
        history: &[ChatMessage],
        state: &ConversationState,
    ) -> Option<PatternAnalysis>;
}
