//! Conversation state aggregate.
//!
//! The only durable memory a coaching conversation has of itself. Stored as
//! a flat JSON document between turns and mutated once per user turn.

use serde::{Deserialize, Serialize};

use super::detector::{DetectedObservation, DetectedThread, PatternAnalysis};
use super::moves::ResponseMove;
use super::normalize;
use super::observation::Observation;
use super::phase::ConversationPhase;
use super::scoring::ThreadPriorityScorer;
use super::thread::Thread;
use crate::domain::foundation::{ObservationId, StateMachine, ThreadId};

/// Exchanges allowed between syntheses before one becomes mandatory.
pub const SYNTHESIS_INTERVAL: u32 = 3;

/// Aggregate root of a coaching conversation.
///
/// Every field defaults, so partially written documents still load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationState {
    pub current_phase: ConversationPhase,
    pub phase_exchange_count: u32,
    pub total_exchange_count: u32,

    pub active_threads: Vec<Thread>,
    pub current_thread_id: Option<ThreadId>,
    pub completed_threads: Vec<ThreadId>,

    pub observations: Vec<Observation>,

    pub last_synthesis_exchange: u32,
    pub synthesis_points: Vec<String>,

    pub last_move: Option<ResponseMove>,
    pub move_history: Vec<ResponseMove>,

    pub dominant_emotion: Option<String>,

    pub core_issue_identified: bool,
    pub core_issue_statement: Option<String>,

    pub ready_for_options: bool,
    pub transition_reason: Option<String>,
}

impl ConversationState {
    /// Fresh state for a new conversation.
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Exchanges since the last synthesis move.
    pub fn exchanges_since_synthesis(&self) -> u32 {
        self.total_exchange_count
            .saturating_sub(self.last_synthesis_exchange)
    }

    /// True once [`SYNTHESIS_INTERVAL`] exchanges have passed without a synthesis.
    pub fn needs_synthesis(&self) -> bool {
        self.exchanges_since_synthesis() >= SYNTHESIS_INTERVAL
    }

    /// Observations ready to be shared, oldest detection first.
    pub fn unsurfaced_observations(&self) -> Vec<&Observation> {
        let mut ready: Vec<&Observation> = self
            .observations
            .iter()
            .filter(|o| o.is_ready_to_surface())
            .collect();
        ready.sort_by_key(|o| o.detected_at_exchange);
        ready
    }

    /// True if any observation has been shared with the user.
    pub fn has_surfaced_observation(&self) -> bool {
        self.observations.iter().any(|o| o.surfaced)
    }

    /// The highest-priority thread that is not completed.
    pub fn highest_priority_thread(&self) -> Option<&Thread> {
        ThreadPriorityScorer::new().best(
            &self.active_threads,
            &self.completed_threads,
            self.total_exchange_count,
        )
    }

    /// Looks up a thread by id.
    pub fn thread(&self, id: &ThreadId) -> Option<&Thread> {
        self.active_threads.iter().find(|t| &t.id == id)
    }

    /// The last `n` moves, oldest first.
    pub fn recent_moves(&self, n: usize) -> &[ResponseMove] {
        let start = self.move_history.len().saturating_sub(n);
        &self.move_history[start..]
    }

    /// How many challenge moves this conversation has used.
    pub fn challenge_count(&self) -> usize {
        self.move_history
            .iter()
            .filter(|m| **m == ResponseMove::Challenge)
            .count()
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    /// Counts one user turn in both counters.
    pub fn record_exchange(&mut self) {
        self.total_exchange_count += 1;
        self.phase_exchange_count += 1;
    }

    /// Moves one phase forward and resets the in-phase counter.
    ///
    /// Entering `Closing` marks the conversation ready for options. Returns
    /// the new phase, or `None` when already terminal.
    pub fn advance_phase(&mut self, reason: impl Into<String>) -> Option<ConversationPhase> {
        let next = self.current_phase.step()?;
        let next = self.current_phase.transition_to(next).ok()?;

        self.current_phase = next;
        self.phase_exchange_count = 0;
        self.transition_reason = Some(reason.into());
        if next == ConversationPhase::Closing {
            self.ready_for_options = true;
        }
        Some(next)
    }

    /// Adds a detected thread unless it duplicates a tracked one.
    pub fn add_thread(&mut self, detected: &DetectedThread) -> Option<ThreadId> {
        let topic = detected.topic.trim();
        if topic.is_empty() || self.active_threads.iter().any(|t| t.covers_topic(topic)) {
            return None;
        }

        let id = self.unused_thread_id();
        let mut thread = Thread::new(
            id.clone(),
            topic,
            detected.thread_type,
            detected.emotional_intensity,
            detected.relevance_score,
            self.total_exchange_count,
        );
        if let Some(quote) = &detected.quote {
            thread = thread.with_quote(quote.clone());
        }
        self.active_threads.push(thread);
        Some(id)
    }

    /// Adds a detected observation unless its text is already tracked.
    pub fn add_observation(&mut self, detected: &DetectedObservation) -> Option<ObservationId> {
        let text = detected.text.trim();
        if text.is_empty() || self.observations.iter().any(|o| o.has_same_text(text)) {
            return None;
        }

        let id = self.unused_observation_id();
        let observation = Observation::new(
            id.clone(),
            detected.kind,
            text,
            detected.confidence,
            self.total_exchange_count,
        )
        .with_quotes(detected.supporting_quotes.clone());
        self.observations.push(observation);
        Some(id)
    }

    /// Raises a thread's depth and touches it at the current exchange.
    ///
    /// A thread reaching the depth cap joins `completed_threads`. Unknown ids
    /// are ignored.
    pub fn apply_depth_update(&mut self, id: &ThreadId, depth: u8) -> bool {
        let exchange = self.total_exchange_count;
        let Some(thread) = self.active_threads.iter_mut().find(|t| &t.id == id) else {
            return false;
        };
        let changed = thread.deepen_to(depth, exchange);
        if thread.is_fully_explored() && !self.completed_threads.contains(id) {
            self.completed_threads.push(id.clone());
        }
        changed
    }

    /// Merges a pattern analysis: new threads, depth updates, new
    /// observations and the dominant emotion.
    pub fn apply_analysis(&mut self, analysis: &PatternAnalysis) {
        for detected in &analysis.new_threads {
            self.add_thread(detected);
        }
        for (id, depth) in &analysis.updated_thread_depths {
            self.apply_depth_update(id, *depth);
        }
        for detected in &analysis.new_observations {
            self.add_observation(detected);
        }
        if let Some(emotion) = &analysis.dominant_emotion {
            self.dominant_emotion = Some(emotion.clone());
        }
    }

    /// Points `current_thread_id` at the highest-priority open thread.
    pub fn refresh_focus(&mut self) {
        self.current_thread_id = self.highest_priority_thread().map(|t| t.id.clone());
    }

    /// Marks the oldest ready observation as surfaced at the current exchange.
    pub fn surface_next_observation(&mut self) -> Option<ObservationId> {
        let exchange = self.total_exchange_count;
        let target = self
            .unsurfaced_observations()
            .first()
            .map(|o| o.id.clone())?;
        let observation = self.observations.iter_mut().find(|o| o.id == target)?;
        observation.mark_surfaced(exchange);
        Some(target)
    }

    /// Records the move a coach turn took.
    pub fn record_move(&mut self, response_move: ResponseMove) {
        self.last_move = Some(response_move);
        self.move_history.push(response_move);
        if response_move == ResponseMove::Synthesis {
            self.last_synthesis_exchange = self.total_exchange_count;
        }
    }

    /// Appends synthesis points, skipping blanks and repeats.
    pub fn add_synthesis_points<I, S>(&mut self, points: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for point in points {
            let point = point.as_ref().trim();
            if point.is_empty() {
                continue;
            }
            let key = normalize(point);
            if !self.synthesis_points.iter().any(|p| normalize(p) == key) {
                self.synthesis_points.push(point.to_string());
            }
        }
    }

    /// Records the core issue statement. Blank statements are ignored.
    pub fn identify_core_issue(&mut self, statement: &str) {
        let statement = statement.trim();
        if statement.is_empty() {
            return;
        }
        self.core_issue_identified = true;
        self.core_issue_statement = Some(statement.to_string());
    }

    /// Next free `tN`. Skips numbers taken by hand-edited documents.
    fn unused_thread_id(&self) -> ThreadId {
        (self.active_threads.len() + 1..)
            .map(ThreadId::numbered)
            .find(|id| self.thread(id).is_none())
            .unwrap_or_else(|| ThreadId::numbered(0))
    }

    fn unused_observation_id(&self) -> ObservationId {
        (self.observations.len() + 1..)
            .map(ObservationId::numbered)
            .find(|id| !self.observations.iter().any(|o| &o.id == id))
            .unwrap_or_else(|| ObservationId::numbered(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coaching::observation::ObservationKind;
    use crate::domain::coaching::thread::{EmotionalIntensity, ThreadType};
    use crate::domain::foundation::UnitScore;
    use std::collections::BTreeMap;

    fn detected_thread(topic: &str) -> DetectedThread {
        DetectedThread {
            topic: topic.to_string(),
            thread_type: ThreadType::Emotional,
            emotional_intensity: EmotionalIntensity::High,
            relevance_score: UnitScore::new(0.7),
            quote: Some("I feel stuck".to_string()),
        }
    }

    fn detected_observation(text: &str, confidence: f64) -> DetectedObservation {
        DetectedObservation {
            kind: ObservationKind::Pattern,
            text: text.to_string(),
            confidence: UnitScore::new(confidence),
            supporting_quotes: vec![],
        }
    }

    mod synthesis {
        use super::*;

        #[test]
        fn fresh_state_does_not_need_synthesis() {
            assert!(!ConversationState::new().needs_synthesis());
        }

        #[test]
        fn needs_synthesis_after_three_exchanges() {
            let mut state = ConversationState::new();
            for _ in 0..3 {
                state.record_exchange();
            }
            assert!(state.needs_synthesis());
        }

        #[test]
        fn synthesis_move_resets_the_clock() {
            let mut state = ConversationState::new();
            for _ in 0..4 {
                state.record_exchange();
            }
            state.record_move(ResponseMove::Synthesis);
            assert_eq!(state.last_synthesis_exchange, 4);
            assert!(!state.needs_synthesis());
        }

        #[test]
        fn synthesis_points_are_deduplicated() {
            let mut state = ConversationState::new();
            state.add_synthesis_points(["Feels stuck at work", " ", "feels STUCK at work"]);
            state.add_synthesis_points(vec!["Values autonomy".to_string()]);
            assert_eq!(
                state.synthesis_points,
                vec!["Feels stuck at work".to_string(), "Values autonomy".to_string()]
            );
        }
    }

    mod phases {
        use super::*;

        #[test]
        fn advance_moves_one_step_and_resets_counter() {
            let mut state = ConversationState::new();
            state.record_exchange();
            state.record_exchange();

            let next = state.advance_phase("Condition met: threads_identified");

            assert_eq!(next, Some(ConversationPhase::Exploration));
            assert_eq!(state.current_phase, ConversationPhase::Exploration);
            assert_eq!(state.phase_exchange_count, 0);
            assert_eq!(state.total_exchange_count, 2);
            assert_eq!(
                state.transition_reason.as_deref(),
                Some("Condition met: threads_identified")
            );
            assert!(!state.ready_for_options);
        }

        #[test]
        fn entering_closing_sets_ready_for_options() {
            let mut state = ConversationState {
                current_phase: ConversationPhase::Insight,
                ..Default::default()
            };
            state.advance_phase("insight given");
            assert_eq!(state.current_phase, ConversationPhase::Closing);
            assert!(state.ready_for_options);
        }

        #[test]
        fn closing_does_not_advance() {
            let mut state = ConversationState {
                current_phase: ConversationPhase::Closing,
                phase_exchange_count: 5,
                ..Default::default()
            };
            assert_eq!(state.advance_phase("again"), None);
            assert_eq!(state.current_phase, ConversationPhase::Closing);
            assert_eq!(state.phase_exchange_count, 5);
        }
    }

    mod threads {
        use super::*;

        #[test]
        fn add_thread_assigns_unique_ids_and_exchange() {
            let mut state = ConversationState::new();
            state.record_exchange();
            let a = state.add_thread(&detected_thread("feeling stuck")).unwrap();
            let b = state.add_thread(&detected_thread("values family")).unwrap();

            assert_eq!(a.as_str(), "t1");
            assert_eq!(b.as_str(), "t2");
            let thread = state.thread(&a).unwrap();
            assert_eq!(thread.first_mentioned_exchange, 1);
            assert_eq!(thread.related_quotes, vec!["I feel stuck".to_string()]);
        }

        #[test]
        fn duplicate_topics_are_not_added_twice() {
            let mut state = ConversationState::new();
            assert!(state.add_thread(&detected_thread("feeling stuck")).is_some());
            assert!(state.add_thread(&detected_thread("Feeling Stuck")).is_none());
            assert!(state
                .add_thread(&detected_thread("feeling stuck at"))
                .is_none());
            assert_eq!(state.active_threads.len(), 1);
        }

        #[test]
        fn depth_update_completes_thread_at_cap() {
            let mut state = ConversationState::new();
            let id = state.add_thread(&detected_thread("feeling stuck")).unwrap();
            state.record_exchange();

            assert!(state.apply_depth_update(&id, 3));
            assert_eq!(state.completed_threads, vec![id.clone()]);
            assert_eq!(state.thread(&id).unwrap().last_touched_exchange, 1);

            // repeated updates don't duplicate the completion
            state.apply_depth_update(&id, 3);
            assert_eq!(state.completed_threads.len(), 1);
        }

        #[test]
        fn depth_update_ignores_unknown_thread() {
            let mut state = ConversationState::new();
            assert!(!state.apply_depth_update(&ThreadId::new("t404").unwrap(), 2));
        }

        #[test]
        fn refresh_focus_targets_best_open_thread() {
            let mut state = ConversationState::new();
            let mut weak = detected_thread("values routine");
            weak.emotional_intensity = EmotionalIntensity::Low;
            weak.relevance_score = UnitScore::new(0.1);
            state.add_thread(&weak);
            let strong = state.add_thread(&detected_thread("feeling trapped")).unwrap();

            state.refresh_focus();
            assert_eq!(state.current_thread_id, Some(strong.clone()));

            state.completed_threads.push(strong);
            state.refresh_focus();
            assert_ne!(state.current_thread_id, None);
            assert_ne!(state.current_thread_id, state.completed_threads.first().cloned());
        }
    }

    mod observations {
        use super::*;

        #[test]
        fn duplicate_texts_are_not_added_twice() {
            let mut state = ConversationState::new();
            assert!(state.add_observation(&detected_observation("Recurring theme", 0.7)).is_some());
            assert!(state.add_observation(&detected_observation("recurring  THEME", 0.9)).is_none());
            assert_eq!(state.observations.len(), 1);
        }

        #[test]
        fn unsurfaced_are_ordered_oldest_first_and_filtered() {
            let mut state = ConversationState::new();
            state.record_exchange();
            state.add_observation(&detected_observation("first", 0.7));
            state.add_observation(&detected_observation("too weak", 0.4));
            state.record_exchange();
            state.add_observation(&detected_observation("second", 0.9));

            let texts: Vec<&str> = state
                .unsurfaced_observations()
                .iter()
                .map(|o| o.text.as_str())
                .collect();
            assert_eq!(texts, vec!["first", "second"]);
        }

        #[test]
        fn surface_next_marks_oldest_once() {
            let mut state = ConversationState::new();
            state.record_exchange();
            state.add_observation(&detected_observation("first", 0.7));
            state.add_observation(&detected_observation("second", 0.7));
            state.record_exchange();

            let surfaced = state.surface_next_observation().unwrap();
            assert_eq!(state.observations[0].id, surfaced);
            assert_eq!(state.observations[0].surfaced_at_exchange, Some(2));
            assert!(state.has_surfaced_observation());

            state.surface_next_observation();
            state.surface_next_observation();
            assert!(state.observations.iter().all(|o| o.surfaced));
            assert_eq!(state.observations[0].surfaced_at_exchange, Some(2));
        }
    }

    mod analysis {
        use super::*;

        #[test]
        fn apply_analysis_merges_all_parts() {
            let mut state = ConversationState::new();
            state.record_exchange();
            let existing = state.add_thread(&detected_thread("feeling stuck")).unwrap();
            state.record_exchange();

            let mut depths = BTreeMap::new();
            depths.insert(existing.clone(), 1);
            let analysis = PatternAnalysis {
                new_threads: vec![detected_thread("values freedom")],
                new_observations: vec![detected_observation("'stuck' mentioned 3 times", 0.8)],
                updated_thread_depths: depths,
                dominant_emotion: Some("frustrated".to_string()),
            };

            state.apply_analysis(&analysis);

            assert_eq!(state.active_threads.len(), 2);
            assert_eq!(state.thread(&existing).unwrap().exploration_depth, 1);
            assert_eq!(state.thread(&existing).unwrap().last_touched_exchange, 2);
            assert_eq!(state.observations.len(), 1);
            assert_eq!(state.dominant_emotion.as_deref(), Some("frustrated"));
        }
    }

    mod moves {
        use super::*;

        #[test]
        fn recent_moves_returns_tail() {
            let mut state = ConversationState::new();
            for m in [
                ResponseMove::Reflection,
                ResponseMove::DeepeningQuestion,
                ResponseMove::Challenge,
            ] {
                state.record_move(m);
            }
            assert_eq!(
                state.recent_moves(2),
                &[ResponseMove::DeepeningQuestion, ResponseMove::Challenge]
            );
            assert_eq!(state.recent_moves(10).len(), 3);
            assert_eq!(state.challenge_count(), 1);
            assert_eq!(state.last_move, Some(ResponseMove::Challenge));
        }

        #[test]
        fn core_issue_requires_text() {
            let mut state = ConversationState::new();
            state.identify_core_issue("  ");
            assert!(!state.core_issue_identified);
            state.identify_core_issue("Effort feels pointless");
            assert!(state.core_issue_identified);
        }
    }

    mod persistence {
        use super::*;

        #[test]
        fn partial_document_loads_with_defaults() {
            let state: ConversationState =
                serde_json::from_str(r#"{"current_phase":"deepening","total_exchange_count":7}"#)
                    .unwrap();
            assert_eq!(state.current_phase, ConversationPhase::Deepening);
            assert_eq!(state.total_exchange_count, 7);
            assert!(state.active_threads.is_empty());
        }

        #[test]
        fn round_trips_through_json() {
            let mut state = ConversationState::new();
            state.record_exchange();
            state.add_thread(&detected_thread("feeling stuck"));
            state.record_move(ResponseMove::Reflection);

            let json = serde_json::to_string(&state).unwrap();
            let back: ConversationState = serde_json::from_str(&json).unwrap();
            assert_eq!(back, state);
        }
    }
}
