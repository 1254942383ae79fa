//! Phase transition rules.
//!
//! Each phase has a minimum and maximum number of in-phase exchanges and an
//! ordered list of named exit conditions. Reaching the maximum forces a
//! transition; nothing advances before the minimum.

use serde::{Deserialize, Serialize};

use super::moves::ResponseMove;
use super::phase::ConversationPhase;
use super::state::ConversationState;

/// Moves inspected by [`TransitionCondition::InsightGiven`].
const INSIGHT_LOOKBACK: usize = 3;

/// A named exit condition evaluated against the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCondition {
    /// At least two threads are tracked.
    ThreadsIdentified,
    /// At least one observation exists.
    PatternDetected,
    /// Some thread was probed to depth 2 or more.
    ThreadExplored,
    CoreIssueIdentified,
    ObservationSurfaced,
    /// An Insight move was among the last three moves.
    InsightGiven,
}

impl TransitionCondition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ThreadsIdentified => "threads_identified",
            Self::PatternDetected => "pattern_detected",
            Self::ThreadExplored => "thread_explored",
            Self::CoreIssueIdentified => "core_issue_identified",
            Self::ObservationSurfaced => "observation_surfaced",
            Self::InsightGiven => "insight_given",
        }
    }

    pub fn is_met(&self, state: &ConversationState) -> bool {
        match self {
            Self::ThreadsIdentified => state.active_threads.len() >= 2,
            Self::PatternDetected => !state.observations.is_empty(),
            Self::ThreadExplored => state.active_threads.iter().any(|t| t.exploration_depth >= 2),
            Self::CoreIssueIdentified => state.core_issue_identified,
            Self::ObservationSurfaced => state.has_surfaced_observation(),
            Self::InsightGiven => state
                .recent_moves(INSIGHT_LOOKBACK)
                .contains(&ResponseMove::Insight),
        }
    }
}

/// Exchange bounds and exit conditions for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseRules {
    pub min_exchanges: u32,
    pub max_exchanges: u32,
    pub conditions: &'static [TransitionCondition],
}

impl PhaseRules {
    /// Rules for `phase`.
    pub fn for_phase(phase: ConversationPhase) -> Self {
        use TransitionCondition::*;
        match phase {
            ConversationPhase::Opening => Self::new(1, 3, &[ThreadsIdentified]),
            ConversationPhase::Exploration => Self::new(2, 5, &[PatternDetected, ThreadExplored]),
            ConversationPhase::Deepening => {
                Self::new(2, 4, &[CoreIssueIdentified, ObservationSurfaced])
            }
            ConversationPhase::Insight => Self::new(1, 3, &[InsightGiven]),
            ConversationPhase::Closing => Self::new(1, 2, &[]),
        }
    }

    const fn new(
        min_exchanges: u32,
        max_exchanges: u32,
        conditions: &'static [TransitionCondition],
    ) -> Self {
        Self {
            min_exchanges,
            max_exchanges,
            conditions,
        }
    }

    /// First satisfied condition in declaration order.
    pub fn first_met(&self, state: &ConversationState) -> Option<TransitionCondition> {
        self.conditions.iter().copied().find(|c| c.is_met(state))
    }
}

/// Outcome of evaluating the transition rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionDecision {
    pub advance: bool,
    pub reason: Option<String>,
    pub next: Option<ConversationPhase>,
}

impl TransitionDecision {
    fn stay() -> Self {
        Self {
            advance: false,
            reason: None,
            next: None,
        }
    }

    fn advance(next: ConversationPhase, reason: String) -> Self {
        Self {
            advance: true,
            reason: Some(reason),
            next: Some(next),
        }
    }
}

/// Decides whether the conversation should leave its current phase.
///
/// Pure: reads the state, never changes it.
pub fn should_transition(state: &ConversationState) -> TransitionDecision {
    let phase = state.current_phase;
    let Some(next) = phase.next() else {
        return TransitionDecision::stay();
    };

    let rules = PhaseRules::for_phase(phase);
    let count = state.phase_exchange_count;

    if count >= rules.max_exchanges {
        return TransitionDecision::advance(
            next,
            format!("Reached max exchanges for {}", phase.label().to_lowercase()),
        );
    }
    if count < rules.min_exchanges {
        return TransitionDecision::stay();
    }

    match rules.first_met(state) {
        Some(condition) => {
            TransitionDecision::advance(next, format!("Condition met: {}", condition.name()))
        }
        None => TransitionDecision::stay(),
    }
}
