//! CoachingEngine - per-turn orchestration of the coaching core.
//!
//! One call to [`CoachingEngine::process_message`] is one user turn:
//!
//! 1. Count the exchange
//! 2. Detect patterns (plus optional enrichment) and merge them into state
//! 3. Evaluate the phase transition
//! 4. Generate, validate and regenerate (bounded)
//! 5. Fold the accepted reply back into state
//!
//! The engine works on a private copy of the caller's state. A failed
//! generation leaves the caller's state untouched.

use std::sync::Arc;

use crate::domain::coaching::{
    should_transition, ChatMessage, CoachReply, ConversationState, InstructionTemplates,
    PatternDetector, PhaseRules, ResponseMove, ResponseValidator, ValidationIssue,
};
use crate::domain::foundation::SessionId;
use crate::ports::{
    ExpectedShape, GenerationError, GenerationRequest, PatternEnricher, ReplyGenerator,
};

/// Upper bound on regenerations after the first attempt.
pub const MAX_REGENERATIONS: u32 = 2;

const DEFAULT_TRANSITION_REASON: &str = "Coach indicated transition";

/// Input for one user turn.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub user_message: String,
    /// The decision situation the conversation is about.
    pub situation: String,
    /// Prior messages, oldest first, excluding `user_message`.
    pub chat_history: Vec<ChatMessage>,
    pub session_id: Option<SessionId>,
}

impl TurnInput {
    pub fn new(user_message: impl Into<String>, situation: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            situation: situation.into(),
            chat_history: Vec::new(),
            session_id: None,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.chat_history = history;
        self
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// The accepted coach turn and the updated state.
#[derive(Debug, Clone)]
pub struct CoachTurn {
    pub text: String,
    pub response_move: ResponseMove,
    /// Why the coach asked what it asked.
    pub tooltip: Option<String>,
    pub suggested_options: Option<Vec<String>>,
    pub synthesis_points: Vec<String>,
    pub core_issue: Option<String>,
    pub ready_for_options: bool,
    pub state: ConversationState,
    /// Generation calls spent on this turn (1..=3).
    pub attempts: u32,
    /// Issues still present after mechanical fixes.
    pub residual_issues: Vec<ValidationIssue>,
}

/// Turn failures. The caller's state is never modified on error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// Generated JSON did not describe a usable coach turn.
    #[error("unusable coach reply: {0}")]
    UnusableReply(String),
}

impl EngineError {
    /// True if retrying the same turn from the same state may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Generation(GenerationError::Provider(err)) => err.is_retryable(),
            Self::Generation(GenerationError::MalformedOutput { .. }) => true,
            Self::UnusableReply(_) => true,
        }
    }
}

/// Orchestrates detection, phase control, generation and validation.
pub struct CoachingEngine {
    generator: Arc<dyn ReplyGenerator>,
    enricher: Option<Arc<dyn PatternEnricher>>,
    detector: PatternDetector,
    validator: ResponseValidator,
    templates: InstructionTemplates,
    max_regenerations: u32,
}

impl CoachingEngine {
    pub fn new(generator: Arc<dyn ReplyGenerator>) -> Self {
        Self {
            generator,
            enricher: None,
            detector: PatternDetector::new(),
            validator: ResponseValidator::new(),
            templates: InstructionTemplates::standard(),
            max_regenerations: MAX_REGENERATIONS,
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn PatternEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_validator(mut self, validator: ResponseValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_templates(mut self, templates: InstructionTemplates) -> Self {
        self.templates = templates;
        self
    }

    /// Sets the regeneration budget, capped at [`MAX_REGENERATIONS`].
    pub fn with_max_regenerations(mut self, max: u32) -> Self {
        self.max_regenerations = max.min(MAX_REGENERATIONS);
        self
    }

    pub fn max_regenerations(&self) -> u32 {
        self.max_regenerations
    }

    /// Processes one user turn.
    ///
    /// # Errors
    ///
    /// Any generation failure fails the whole turn; `current` is left as is.
    pub async fn process_message(
        &self,
        input: &TurnInput,
        current: Option<&ConversationState>,
    ) -> Result<CoachTurn, EngineError> {
        let mut state = current.cloned().unwrap_or_default();
        state.record_exchange();

        let mut analysis = self
            .detector
            .analyze(&input.user_message, &input.chat_history, &state);
        if let Some(enricher) = &self.enricher {
            if let Some(enrichment) = enricher
                .try_enrich(&input.user_message, &input.chat_history, &state)
                .await
            {
                analysis.merge_enrichment(enrichment);
            }
        }
        state.apply_analysis(&analysis);
        state.refresh_focus();

        let decision = should_transition(&state);
        if decision.advance {
            let from = state.current_phase;
            let reason = decision.reason.unwrap_or_default();
            if let Some(to) = state.advance_phase(reason.clone()) {
                tracing::info!(
                    session_id = ?input.session_id,
                    from = from.label(),
                    to = to.label(),
                    reason = %reason,
                    "Phase transition"
                );
            }
        }

        let instructions =
            self.templates
                .coach_instructions(&state, &input.situation, &input.chat_history);
        let (reply, attempts, residual_issues) = self
            .generate_validated(&instructions, input, &state)
            .await?;

        self.fold_reply(&mut state, &reply);

        Ok(CoachTurn {
            text: reply.response.clone(),
            response_move: reply.declared_move(),
            tooltip: reply.question_reason.clone().filter(|r| !r.trim().is_empty()),
            suggested_options: reply.suggested_options.clone().filter(|o| !o.is_empty()),
            synthesis_points: state.synthesis_points.clone(),
            core_issue: state.core_issue_statement.clone(),
            ready_for_options: state.ready_for_options,
            state,
            attempts,
            residual_issues,
        })
    }

    /// Generate-validate-regenerate loop. Returns the accepted reply, the
    /// number of generation calls and the issues left after fixing.
    async fn generate_validated(
        &self,
        instructions: &str,
        input: &TurnInput,
        state: &ConversationState,
    ) -> Result<(CoachReply, u32, Vec<ValidationIssue>), EngineError> {
        let mut prompt = instructions.to_string();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut request = GenerationRequest::new(
                prompt.clone(),
                &input.user_message,
                ExpectedShape::CoachReply,
            );
            if let Some(session_id) = input.session_id {
                request = request.with_session(session_id);
            }

            let output = self.generator.generate(request).await?;
            let mut reply = CoachReply::from_value(output.value)
                .map_err(|e| EngineError::UnusableReply(e.to_string()))?;
            if reply.response.trim().is_empty() {
                return Err(EngineError::UnusableReply("empty response text".to_string()));
            }

            let response_move = reply.declared_move();
            let issues = self.validator.validate(&reply.response, response_move, state);
            if issues.is_empty() {
                return Ok((reply, attempt, Vec::new()));
            }

            let rule_ids: Vec<&str> = issues.iter().map(|i| i.rule_id.as_str()).collect();
            if attempt <= self.max_regenerations {
                tracing::warn!(
                    session_id = ?input.session_id,
                    phase = state.current_phase.label(),
                    attempt,
                    issues = ?rule_ids,
                    "Response failed validation, regenerating"
                );
                if let Some(block) =
                    ResponseValidator::correction_block(&issues, state.current_phase)
                {
                    prompt = format!("{}\n\n{}", instructions, block);
                }
                continue;
            }

            tracing::warn!(
                session_id = ?input.session_id,
                phase = state.current_phase.label(),
                attempt,
                issues = ?rule_ids,
                "Regenerations exhausted, applying mechanical fixes"
            );
            let fixed = self.validator.apply_mechanical_fixes(&reply.response, &issues);
            if !fixed.trim().is_empty() {
                reply.response = fixed;
            }
            let residual = self.validator.validate(&reply.response, response_move, state);
            return Ok((reply, attempt, residual));
        }
    }

    /// Commits the accepted reply into state.
    fn fold_reply(&self, state: &mut ConversationState, reply: &CoachReply) {
        let response_move = reply.declared_move();
        state.record_move(response_move);
        state.add_synthesis_points(&reply.synthesis_points);

        if let Some(core_issue) = reply.core_issue() {
            state.identify_core_issue(core_issue);
        }

        for detected in reply.detected_threads() {
            state.add_thread(&detected);
        }
        for detected in reply.detected_observations() {
            state.add_observation(&detected);
        }

        if response_move == ResponseMove::Observation {
            state.surface_next_observation();
        }

        let min = PhaseRules::for_phase(state.current_phase).min_exchanges;
        if reply.should_transition && state.phase_exchange_count >= min {
            let reason = reply
                .transition_reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_TRANSITION_REASON)
                .to_string();
            let from = state.current_phase;
            if let Some(to) = state.advance_phase(reason.clone()) {
                tracing::info!(
                    from = from.label(),
                    to = to.label(),
                    reason = %reason,
                    "Phase transition requested by reply"
                );
            }
        }

        state.refresh_focus();
    }
}
