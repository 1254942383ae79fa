//! Generation instructions for coach turns and pattern enrichment.
//!
//! [`InstructionTemplates`] is constructed once at startup and handed to the
//! engine; per-phase guidance can be replaced without touching the engine.

use std::collections::HashMap;

use super::message::ChatMessage;
use super::moves::ResponseMove;
use super::phase::ConversationPhase;
use super::scoring::ThreadPriorityScorer;
use super::state::ConversationState;
use super::transition::should_transition;

/// Messages of history quoted back to the generator.
pub const RECENT_MESSAGE_LIMIT: usize = 10;

const THREAD_LIMIT: usize = 5;
const ENRICHMENT_HISTORY_LIMIT: usize = 6;
const ENRICHMENT_SNIPPET_CHARS: usize = 100;

const CORE_IDENTITY: &str = r#"## Your Role: Decision Coach

You are having a real conversation with someone who is trying to understand their own situation. You are not filling in a form and you are not running a survey.

### How you work

1. **Reflect first.** Show that you heard them before asking anything new. Name the emotion and paraphrase the key point.
2. **Go deeper, not wider.** Stay with the thread that carries weight. Ask "what would that look like?" rather than "what type of X?".
3. **Connect the dots.** Point out recurring words and statements that pull against each other.
4. **Synthesize regularly.** Every few exchanges, pull together what you have learned so far.
5. **Offer insight tentatively.** In later phases share your perspective with "I wonder if..." or "Here's what strikes me...".

### Never

- open with "Understood" or "Got it"
- ask "what kind of X: A, B or C?"
- ask more than one question in a response
- hop between topics
- give advice before you understand the situation"#;

const RESPONSE_FORMAT: &str = r#"Reply with a single JSON object:
{
  "response": "what you say to the user, 2-4 sentences",
  "response_move": "REFLECTION | OBSERVATION | CHALLENGE | DEEPENING_QUESTION | SYNTHESIS | INSIGHT | TRANSITION",
  "threads_detected": [
    {"topic": "feeling stuck", "type": "emotional", "emotional_intensity": "high", "relevance_score": 0.8, "supporting_quote": "nothing I do seems to matter"}
  ],
  "observations_detected": [
    {"type": "contradiction", "text": "Wants connection but calls most interactions pointless", "confidence": 0.8, "supporting_quotes": ["I want closer friends", "talking to people feels pointless"]}
  ],
  "synthesis_points": ["short learning"],
  "core_issue": "the core issue if you can name it, otherwise null",
  "should_transition": false,
  "transition_reason": null,
  "question_reason": "why you are asking or saying this, shown to the user as a tooltip",
  "suggested_options": ["quick reply"]
}

Notes:
- only list threads and observations that are NEW in this message
- include "suggested_options" only when the question has natural choices
- keep "response" conversational and specific to what they said"#;

const ENRICHMENT_SYSTEM: &str =
    "You are an expert at analyzing conversational patterns. Be concise.";

const ENRICHMENT_FORMAT: &str = r#"Return JSON:
{
  "new_threads": [{"topic": "...", "type": "emotional|pattern|contradiction|value|mentioned", "emotional_intensity": "low|medium|high|critical", "relevance_score": 0.0, "quote": "..."}],
  "new_observations": [{"type": "pattern|contradiction|value|emotion", "text": "...", "confidence": 0.0, "supporting_quotes": ["..."]}],
  "dominant_emotion": "neutral|anxious|frustrated|excited|confused|sad|hopeful"
}"#;

/// What the coach should be doing in one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseGuidance {
    pub goal: String,
    pub approach: Vec<String>,
    pub good_example: String,
    pub bad_example: String,
}

impl PhaseGuidance {
    pub fn new(
        goal: impl Into<String>,
        approach: &[&str],
        good_example: impl Into<String>,
        bad_example: impl Into<String>,
    ) -> Self {
        Self {
            goal: goal.into(),
            approach: approach.iter().map(|s| s.to_string()).collect(),
            good_example: good_example.into(),
            bad_example: bad_example.into(),
        }
    }

    /// Built-in guidance for `phase`.
    pub fn standard(phase: ConversationPhase) -> Self {
        match phase {
            ConversationPhase::Opening => Self::new(
                phase.goal(),
                &[
                    "Reflect back what you heard in your own words",
                    "Notice topics that sound charged or unclear",
                    "Stay at the surface for now and note threads for later",
                    "End with ONE open question",
                ],
                "So you're weighing whether to leave. What makes this feel urgent right now?",
                "Understood. What type of decision is this: career, financial or personal?",
            ),
            ConversationPhase::Exploration => Self::new(
                phase.goal(),
                &[
                    "Work the thread marked CURRENT unless the user clearly moved on",
                    "Ask for concrete moments: \"tell me about a time when...\"",
                    "If they deflect, come back to the thread gently",
                ],
                "You said you feel 'stuck'. When was that feeling strongest recently?",
                "What kind of activity would help: physical, creative or social?",
            ),
            ConversationPhase::Deepening => Self::new(
                phase.goal(),
                &[
                    "Lead with an observation rather than a question",
                    "Use their own words back to them",
                    "Name tensions with curiosity, never judgment",
                    "Challenge at most once in the whole conversation",
                ],
                "I'm noticing that you want connection, yet most conversations feel pointless to you. What do you make of that?",
                "What kind of connection are you after: professional, personal or romantic?",
            ),
            ConversationPhase::Insight => Self::new(
                phase.goal(),
                &[
                    "Start by synthesizing the core issue",
                    "Offer one or two tentative reframes grounded in what they said",
                    "Check how it lands and leave room to be wrong",
                ],
                "Here's what strikes me: the question may be less about which job and more about what would make effort feel worthwhile. Does that fit?",
                "Based on what you said, I recommend volunteering. Would you prefer A, B or C?",
            ),
            ConversationPhase::Closing => Self::new(
                phase.goal(),
                &[
                    "Summarize the core issue and key constraints in two or three sentences",
                    "Ask them to confirm or correct it",
                    "Preview that options come next",
                ],
                "Let me check I have this: the real question is what makes effort feel meaningful to you. If that's right, we can look at paths that address it. Does that capture it?",
                "Great! Here are some hobby ideas for you.",
            ),
        }
    }

    fn render(&self, phase: ConversationPhase) -> String {
        let approach: Vec<String> = self.approach.iter().map(|a| format!("- {}", a)).collect();
        let moves: Vec<&str> = phase.allowed_moves().iter().map(|m| m.label()).collect();
        format!(
            "## Phase: {}\n\n**Goal**: {}\n\n**Approach**:\n{}\n\n**Good response**: \"{}\"\n**Avoid**: \"{}\"\n\n**Allowed Moves**: {}",
            phase.label(),
            self.goal,
            approach.join("\n"),
            self.good_example,
            self.bad_example,
            moves.join(", ")
        )
    }
}

/// Registry of instruction templates.
#[derive(Debug, Clone)]
pub struct InstructionTemplates {
    core_identity: String,
    response_format: String,
    guidance: HashMap<ConversationPhase, PhaseGuidance>,
}

impl Default for InstructionTemplates {
    fn default() -> Self {
        Self::standard()
    }
}

impl InstructionTemplates {
    /// Built-in identity, response format and guidance for every phase.
    pub fn standard() -> Self {
        Self {
            core_identity: CORE_IDENTITY.to_string(),
            response_format: RESPONSE_FORMAT.to_string(),
            guidance: ConversationPhase::ALL
                .into_iter()
                .map(|p| (p, PhaseGuidance::standard(p)))
                .collect(),
        }
    }

    pub fn with_core_identity(mut self, identity: impl Into<String>) -> Self {
        self.core_identity = identity.into();
        self
    }

    pub fn with_phase_guidance(mut self, phase: ConversationPhase, guidance: PhaseGuidance) -> Self {
        self.guidance.insert(phase, guidance);
        self
    }

    /// Guidance registered for `phase`, or the built-in one.
    pub fn guidance_for(&self, phase: ConversationPhase) -> PhaseGuidance {
        self.guidance
            .get(&phase)
            .cloned()
            .unwrap_or_else(|| PhaseGuidance::standard(phase))
    }

    /// Full instructions for generating the next coach turn.
    pub fn coach_instructions(
        &self,
        state: &ConversationState,
        situation: &str,
        history: &[ChatMessage],
    ) -> String {
        let progress = format!(
            "## Conversation Progress\nExchanges: {} | Phase: {} ({} in phase)",
            state.total_exchange_count,
            state.current_phase.label(),
            state.phase_exchange_count
        );

        let sections = [
            self.core_identity.clone(),
            format!("## Current Situation\n{}", situation.trim()),
            progress,
            self.guidance_for(state.current_phase)
                .render(state.current_phase),
            state_context(state),
            constraints(state),
            format!("## Recent Conversation\n{}", recent_conversation(history)),
            format!("## Response Format\n{}", self.response_format),
            "Respond with valid JSON only.".to_string(),
        ];

        sections
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// System instructions for the pattern enrichment call.
    pub fn enrichment_instructions(&self) -> &'static str {
        ENRICHMENT_SYSTEM
    }

    /// Request body for the pattern enrichment call.
    pub fn enrichment_request(
        &self,
        message: &str,
        history: &[ChatMessage],
        state: &ConversationState,
    ) -> String {
        let start = history.len().saturating_sub(ENRICHMENT_HISTORY_LIMIT);
        let summary: Vec<String> = history[start..]
            .iter()
            .map(|m| {
                let snippet: String = m.content.chars().take(ENRICHMENT_SNIPPET_CHARS).collect();
                format!("{}: {}", m.role.label(), snippet)
            })
            .collect();

        let threads: Vec<String> = state
            .active_threads
            .iter()
            .map(|t| format!("- {} ({})", t.topic, t.thread_type.label()))
            .collect();
        let observations: Vec<String> = state
            .observations
            .iter()
            .map(|o| format!("- [{}] {}", o.kind.label(), o.text))
            .collect();

        format!(
            "Analyze this message for emotional threads, contradictions with earlier statements, values and recurring patterns.\n\n\
             User Message: {}\n\n\
             Previous Messages:\n{}\n\n\
             Known Threads:\n{}\n\n\
             Known Observations:\n{}\n\n\
             {}",
            message,
            or_none(&summary),
            or_none(&threads),
            or_none(&observations),
            ENRICHMENT_FORMAT
        )
    }
}

fn or_none(lines: &[String]) -> String {
    if lines.is_empty() {
        "None yet".to_string()
    } else {
        lines.join("\n")
    }
}

fn state_context(state: &ConversationState) -> String {
    let mut sections = Vec::new();

    let ranked = ThreadPriorityScorer::new().rank(
        &state.active_threads,
        &state.completed_threads,
        state.total_exchange_count,
    );
    if !ranked.is_empty() {
        let lines: Vec<String> = ranked
            .iter()
            .take(THREAD_LIMIT)
            .map(|(t, _)| {
                let current = if state.current_thread_id.as_ref() == Some(&t.id) {
                    " (CURRENT)"
                } else {
                    ""
                };
                format!(
                    "- {} [{}] ({}){}",
                    t.topic,
                    t.emotional_intensity.label(),
                    t.depth_label(),
                    current
                )
            })
            .collect();
        sections.push(format!("## Threads Identified\n{}", lines.join("\n")));
    }

    if !state.observations.is_empty() {
        let mut observations: Vec<_> = state.observations.iter().collect();
        observations.sort_by_key(|o| (o.surfaced, o.detected_at_exchange));
        let lines: Vec<String> = observations
            .iter()
            .map(|o| {
                let status = if o.surfaced {
                    "SURFACED"
                } else {
                    "NOT YET SURFACED"
                };
                format!("- [{}] {} [{}]", o.kind.label(), o.text, status)
            })
            .collect();
        sections.push(format!("## Observations Detected\n{}", lines.join("\n")));
    }

    if !state.synthesis_points.is_empty() {
        let lines: Vec<String> = state
            .synthesis_points
            .iter()
            .map(|p| format!("- {}", p))
            .collect();
        sections.push(format!("## Key Learnings So Far\n{}", lines.join("\n")));
    }

    if let Some(issue) = state
        .core_issue_statement
        .as_deref()
        .filter(|_| state.core_issue_identified)
    {
        sections.push(format!("## Core Issue Identified\n{}", issue));
    }

    sections.join("\n\n")
}

fn constraints(state: &ConversationState) -> String {
    let mut notices = Vec::new();

    if state.needs_synthesis() {
        notices.push(format!(
            "MANDATORY: Include a synthesis of what you have heard before asking anything. \
             It has been {} exchanges since the last synthesis.",
            state.exchanges_since_synthesis()
        ));
    }

    let decision = should_transition(state);
    if let (true, Some(next)) = (decision.advance, decision.next) {
        notices.push(format!(
            "TRANSITION: Consider moving toward the {} phase. Reason: {}",
            next.label(),
            decision.reason.unwrap_or_default()
        ));
    }

    if matches!(
        state.current_phase,
        ConversationPhase::Deepening | ConversationPhase::Insight
    ) {
        if let Some(obs) = state.unsurfaced_observations().first() {
            notices.push(format!(
                "OBSERVATION TO SURFACE: You noticed '{}' but have not shared it yet. \
                 Consider making this observation.",
                obs.text
            ));
        }
    }

    let recent_questions = state
        .recent_moves(3)
        .iter()
        .filter(|m| **m == ResponseMove::DeepeningQuestion)
        .count();
    if recent_questions >= 2 {
        notices.push(
            "VARIETY: You have asked several questions in a row. \
             Use a REFLECTION or SYNTHESIS before the next question."
                .to_string(),
        );
    }

    if state.challenge_count() >= 1 {
        notices.push(
            "CHALLENGE LIMIT: You have already challenged once. \
             Do not challenge again in this conversation."
                .to_string(),
        );
    }

    if notices.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = notices.iter().map(|n| format!("- {}", n)).collect();
    format!("## Constraints\n{}", lines.join("\n"))
}

fn recent_conversation(history: &[ChatMessage]) -> String {
    let start = history.len().saturating_sub(RECENT_MESSAGE_LIMIT);
    history[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coaching::detector::{DetectedObservation, DetectedThread};
    use crate::domain::coaching::observation::ObservationKind;
    use crate::domain::coaching::thread::{EmotionalIntensity, ThreadType};
    use crate::domain::foundation::UnitScore;

    fn thread(topic: &str, intensity: EmotionalIntensity) -> DetectedThread {
        DetectedThread {
            topic: topic.to_string(),
            thread_type: ThreadType::Emotional,
            emotional_intensity: intensity,
            relevance_score: UnitScore::new(0.7),
            quote: None,
        }
    }

    fn observation(text: &str) -> DetectedObservation {
        DetectedObservation {
            kind: ObservationKind::Contradiction,
            text: text.to_string(),
            confidence: UnitScore::new(0.8),
            supporting_quotes: vec![],
        }
    }

    mod coach_instructions {
        use super::*;

        #[test]
        fn contains_every_fixed_section() {
            let state = ConversationState::new();
            let text = InstructionTemplates::standard().coach_instructions(
                &state,
                "Should I leave my job?",
                &[ChatMessage::user("I feel stuck in my job")],
            );

            assert!(text.starts_with("## Your Role: Decision Coach"));
            assert!(text.contains("## Current Situation\nShould I leave my job?"));
            assert!(text.contains("Exchanges: 0 | Phase: OPENING (0 in phase)"));
            assert!(text.contains("## Phase: OPENING"));
            assert!(text.contains("**Allowed Moves**: REFLECTION, DEEPENING_QUESTION"));
            assert!(text.contains("USER: I feel stuck in my job"));
            assert!(text.ends_with("Respond with valid JSON only."));
            assert!(!text.contains("## Constraints"));
        }

        #[test]
        fn threads_are_listed_by_priority_with_current_marker() {
            let mut state = ConversationState::new();
            state.add_thread(&thread("values routine", EmotionalIntensity::Low));
            state.add_thread(&thread("feeling trapped", EmotionalIntensity::Critical));
            state.refresh_focus();

            let text = InstructionTemplates::standard().coach_instructions(&state, "", &[]);
            let trapped = text.find("- feeling trapped [critical] (mentioned) (CURRENT)");
            let routine = text.find("- values routine [low] (mentioned)");
            assert!(trapped.is_some() && routine.is_some());
            assert!(trapped < routine);
        }

        #[test]
        fn only_last_ten_messages_are_quoted() {
            let history: Vec<ChatMessage> = (0..12)
                .map(|i| ChatMessage::user(format!("message {}", i)))
                .collect();
            let text = InstructionTemplates::standard().coach_instructions(
                &ConversationState::new(),
                "",
                &history,
            );
            assert!(!text.contains("USER: message 1\n"));
            assert!(text.contains("USER: message 2\n"));
            assert!(text.contains("USER: message 11"));
        }

        #[test]
        fn replaced_guidance_is_used() {
            let templates = InstructionTemplates::standard().with_phase_guidance(
                ConversationPhase::Opening,
                PhaseGuidance::new("Listen only.", &["Say little"], "Mm.", "Lecture."),
            );
            let text = templates.coach_instructions(&ConversationState::new(), "", &[]);
            assert!(text.contains("**Goal**: Listen only."));
        }
    }

    mod constraints {
        use super::*;

        #[test]
        fn synthesis_notice_counts_exchanges() {
            let state = ConversationState {
                total_exchange_count: 4,
                last_synthesis_exchange: 1,
                ..Default::default()
            };
            let text = constraints(&state);
            assert!(text.contains("MANDATORY"));
            assert!(text.contains("3 exchanges since the last synthesis"));
        }

        #[test]
        fn observation_notice_only_in_deepening_and_insight() {
            let mut state = ConversationState::new();
            state.add_observation(&observation("Wants change but fears it"));
            assert!(!constraints(&state).contains("OBSERVATION TO SURFACE"));

            state.current_phase = ConversationPhase::Deepening;
            assert!(constraints(&state).contains("'Wants change but fears it'"));
        }

        #[test]
        fn variety_and_challenge_limits() {
            let mut state = ConversationState {
                current_phase: ConversationPhase::Deepening,
                ..Default::default()
            };
            state.record_move(ResponseMove::Challenge);
            state.record_move(ResponseMove::DeepeningQuestion);
            state.record_move(ResponseMove::DeepeningQuestion);

            let text = constraints(&state);
            assert!(text.contains("VARIETY"));
            assert!(text.contains("CHALLENGE LIMIT"));
        }
    }

    mod enrichment {
        use super::*;

        #[test]
        fn empty_context_says_none_yet() {
            let text = InstructionTemplates::standard().enrichment_request(
                "I hate Mondays",
                &[],
                &ConversationState::new(),
            );
            assert!(text.contains("User Message: I hate Mondays"));
            assert_eq!(text.matches("None yet").count(), 3);
        }

        #[test]
        fn lists_known_threads_and_observations() {
            let mut state = ConversationState::new();
            state.add_thread(&thread("feeling stuck", EmotionalIntensity::High));
            state.add_observation(&observation("Wants change but fears it"));

            let text = InstructionTemplates::standard().enrichment_request(
                "again",
                &[ChatMessage::user("a".repeat(150))],
                &state,
            );
            assert!(text.contains("- feeling stuck (emotional)"));
            assert!(text.contains("- [contradiction] Wants change but fears it"));
            assert!(text.contains(&format!("USER: {}\n", "a".repeat(100))));
        }
    }
}
