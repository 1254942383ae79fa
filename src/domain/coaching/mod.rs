//! Coaching domain: the dialogue-intelligence core.
//!
//! Decides, turn by turn, what kind of coach turn to take next and whether a
//! generated turn is acceptable.
//!
//! - [`ConversationState`] - aggregate root persisted between turns
//! - [`PatternDetector`] - rule-based thread and observation detection
//! - [`ThreadPriorityScorer`] - picks the exploration target
//! - [`should_transition`] - phase advancement rules
//! - [`ResponseValidator`] - structural checks on generated turns
//! - [`InstructionTemplates`] - builds generation instructions

mod detector;
mod message;
mod moves;
mod observation;
mod phase;
mod prompts;
mod reply;
mod scoring;
mod state;
mod thread;
mod transition;
mod validator;

pub use detector::{
    detect_emotion, DetectedObservation, DetectedThread, PatternAnalysis, PatternDetector,
};
pub use message::{ChatMessage, ChatRole};
pub use moves::ResponseMove;
pub use observation::{Observation, ObservationKind};
pub use phase::ConversationPhase;
pub use prompts::{InstructionTemplates, PhaseGuidance, RECENT_MESSAGE_LIMIT};
pub use reply::{CoachReply, EnrichmentReply, ReplyObservation, ReplyThread};
pub use scoring::ThreadPriorityScorer;
pub use state::{ConversationState, SYNTHESIS_INTERVAL};
pub use thread::{topics_overlap, EmotionalIntensity, Thread, ThreadType};
pub use transition::{should_transition, PhaseRules, TransitionCondition, TransitionDecision};
pub use validator::{
    IssueCategory, ResponseValidator, ValidationIssue, ValidationRule, RULESET_VERSION,
};

/// Lowercases, trims and collapses whitespace for duplicate checks.
pub(crate) fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_case_and_spacing() {
        assert_eq!(normalize("  Feeling   STUCK\tat work "), "feeling stuck at work");
        assert_eq!(normalize(""), "");
    }
}
