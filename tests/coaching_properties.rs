//! Property tests for the coaching domain invariants.

use proptest::prelude::*;

use dialogue_coach::domain::coaching::{
    should_transition, ConversationPhase, ConversationState, DetectedObservation, DetectedThread,
    EmotionalIntensity, IssueCategory, ObservationKind, PhaseRules, ResponseMove,
    ResponseValidator, Thread, ThreadPriorityScorer, ThreadType, SYNTHESIS_INTERVAL,
};
use dialogue_coach::domain::foundation::{ThreadId, UnitScore};

// =============================================================================
// Strategies
// =============================================================================

fn arb_phase() -> impl Strategy<Value = ConversationPhase> {
    prop::sample::select(ConversationPhase::ALL.to_vec())
}

fn arb_move() -> impl Strategy<Value = ResponseMove> {
    prop::sample::select(ResponseMove::ALL.to_vec())
}

fn arb_intensity() -> impl Strategy<Value = EmotionalIntensity> {
    prop_oneof![
        Just(EmotionalIntensity::Low),
        Just(EmotionalIntensity::Medium),
        Just(EmotionalIntensity::High),
        Just(EmotionalIntensity::Critical),
    ]
}

fn arb_thread() -> impl Strategy<Value = (Thread, u32)> {
    (
        arb_intensity(),
        0.0f64..=1.0,
        0u8..=3,
        0u32..50,
        0u32..60,
    )
        .prop_map(|(intensity, relevance, depth, touched, current)| {
            let mut thread = Thread::new(
                ThreadId::numbered(1),
                "work stress",
                ThreadType::Emotional,
                intensity,
                UnitScore::new(relevance),
                touched,
            );
            thread.deepen_to(depth, touched);
            (thread, current)
        })
}

fn arb_topic() -> impl Strategy<Value = String> {
    "[a-z]{4,10}( [a-z]{4,10}){0,3}"
}

/// Free text with at least two question marks among quotes, brackets and
/// other sentence punctuation.
fn arb_many_questions() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z \"'()!.]{0,15}", 3..6).prop_map(|parts| parts.join("?"))
}

fn arb_sentence() -> impl Strategy<Value = String> {
    "[a-z]{1,8}( [a-z]{1,8}){0,6}".prop_map(|words| format!("It sounds like {}.", words))
}

/// A state with an arbitrary phase and counters.
fn arb_state() -> impl Strategy<Value = ConversationState> {
    (arb_phase(), 0u32..10, 0u32..40, 0u32..40, any::<bool>()).prop_map(
        |(phase, in_phase, total, last_synthesis, core_issue)| {
            let mut state = ConversationState::new();
            state.current_phase = phase;
            state.phase_exchange_count = in_phase;
            state.total_exchange_count = total;
            state.last_synthesis_exchange = last_synthesis;
            state.core_issue_identified = core_issue;
            state
        },
    )
}

#[derive(Debug, Clone)]
enum Step {
    Exchange,
    Transition,
    Observe(String, f64),
    Surface,
}

fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![
            3 => Just(Step::Exchange),
            2 => Just(Step::Transition),
            2 => ("[a-z]{3,8} [a-z]{3,8}", 0.0f64..=1.0)
                .prop_map(|(text, confidence)| Step::Observe(text, confidence)),
            2 => Just(Step::Surface),
        ],
        0..40,
    )
}

fn apply(state: &mut ConversationState, step: &Step) {
    match step {
        Step::Exchange => state.record_exchange(),
        Step::Transition => {
            if should_transition(state).advance {
                state.advance_phase("test");
            }
        }
        Step::Observe(text, confidence) => {
            state.add_observation(&DetectedObservation {
                kind: ObservationKind::Pattern,
                text: text.clone(),
                confidence: UnitScore::new(*confidence),
                supporting_quotes: vec![],
            });
        }
        Step::Surface => {
            state.surface_next_observation();
        }
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn needs_synthesis_matches_exchange_gap(total in 0u32..1000, last in 0u32..1000) {
        let mut state = ConversationState::new();
        state.total_exchange_count = total;
        state.last_synthesis_exchange = last;

        let expected = i64::from(total) - i64::from(last) >= i64::from(SYNTHESIS_INTERVAL);
        prop_assert_eq!(state.needs_synthesis(), expected);
    }

    #[test]
    fn phases_only_step_forward(steps in arb_steps()) {
        let mut state = ConversationState::new();
        for step in &steps {
            let before = state.current_phase;
            apply(&mut state, step);
            let after = state.current_phase;
            prop_assert!(after == before || before.next() == Some(after));
        }
    }

    #[test]
    fn max_exchanges_always_forces_transition(state in arb_state(), extra in 0u32..3) {
        let mut state = state;
        let rules = PhaseRules::for_phase(state.current_phase);
        state.phase_exchange_count = rules.max_exchanges + extra;

        let decision = should_transition(&state);
        prop_assert_eq!(decision.advance, state.current_phase != ConversationPhase::Closing);
        prop_assert_eq!(decision.next, state.current_phase.next());
    }

    #[test]
    fn nothing_advances_before_minimum(state in arb_state()) {
        let mut state = state;
        let rules = PhaseRules::for_phase(state.current_phase);
        state.phase_exchange_count = state.phase_exchange_count % rules.min_exchanges.max(1);
        prop_assume!(state.phase_exchange_count < rules.min_exchanges);

        prop_assert!(!should_transition(&state).advance);
    }

    #[test]
    fn score_is_deterministic_and_bounded((thread, current) in arb_thread()) {
        let scorer = ThreadPriorityScorer::new();
        let first = scorer.score(&thread, current);

        prop_assert_eq!(first, scorer.score(&thread, current));
        prop_assert!((0.0..=100.0).contains(&first));
    }

    #[test]
    fn duplicate_topics_are_added_once(topic in arb_topic()) {
        let detected = |topic: String| DetectedThread {
            topic,
            thread_type: ThreadType::Mentioned,
            emotional_intensity: EmotionalIntensity::Medium,
            relevance_score: UnitScore::new(0.5),
            quote: None,
        };
        let mut state = ConversationState::new();

        prop_assert!(state.add_thread(&detected(topic.clone())).is_some());
        let shouted = format!("  {}  ", topic.to_uppercase());
        prop_assert!(state.add_thread(&detected(shouted)).is_none());
        prop_assert_eq!(state.active_threads.len(), 1);
    }

    #[test]
    fn surfaced_observations_stay_surfaced(steps in arb_steps()) {
        let mut state = ConversationState::new();
        for step in &steps {
            let surfaced_before: Vec<_> = state
                .observations
                .iter()
                .filter(|o| o.surfaced)
                .map(|o| (o.id.clone(), o.surfaced_at_exchange))
                .collect();

            apply(&mut state, step);

            for (id, at) in surfaced_before {
                let observation = state.observations.iter().find(|o| o.id == id);
                prop_assert!(
                    observation.is_some_and(|o| o.surfaced && o.surfaced_at_exchange == at)
                );
            }
        }
    }

    #[test]
    fn clean_turn_has_no_issues(
        phase in arb_phase(),
        text in arb_sentence(),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut state = ConversationState::new();
        state.current_phase = phase;
        let allowed = phase.allowed_moves();
        let response_move = allowed[pick.index(allowed.len())];

        prop_assert!(ResponseValidator::new().validate(&text, response_move, &state).is_empty());
    }

    #[test]
    fn question_fix_leaves_at_most_one_question(text in arb_many_questions()) {
        let validator = ResponseValidator::new();
        let state = ConversationState::new();
        let issues = validator.validate(&text, ResponseMove::Reflection, &state);
        prop_assume!(issues.iter().any(|i| i.category == IssueCategory::MultipleQuestions));

        let fixed = validator.apply_mechanical_fixes(&text, &issues);
        prop_assert!(!fixed.trim().is_empty());
        prop_assert!(fixed.matches('?').count() <= 1);
    }

    #[test]
    fn disallowed_move_is_one_phase_mismatch(phase in arb_phase(), response_move in arb_move()) {
        prop_assume!(!phase.allows(response_move));
        let mut state = ConversationState::new();
        state.current_phase = phase;

        let issues = ResponseValidator::new().validate("That makes sense.", response_move, &state);
        prop_assert_eq!(issues.len(), 1);
    }
}

#[test]
fn critical_fresh_fully_relevant_thread_scores_maximum() {
    let thread = Thread::new(
        ThreadId::numbered(1),
        "losing my family",
        ThreadType::Emotional,
        EmotionalIntensity::Critical,
        UnitScore::ONE,
        4,
    );

    let score = ThreadPriorityScorer::new().score(&thread, 4);

    assert!((score - 100.0).abs() < 1e-9);
}
