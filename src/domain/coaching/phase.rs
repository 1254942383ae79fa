//! Conversation phases of a coaching session.
//!
//! Phases only move forward:
//! `Opening` → `Exploration` → `Deepening` → `Insight` → `Closing`.
//! Each phase whitelists the response moves a coach turn may take.

use serde::{Deserialize, Serialize};

use super::moves::ResponseMove;
use crate::domain::foundation::StateMachine;

/// The stage a coaching conversation is in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    /// Understand the surface situation and collect threads.
    #[default]
    Opening,

    /// Follow the most promising thread to emotional depth.
    Exploration,

    /// Name what is being seen; surface the core tension.
    Deepening,

    /// Offer a tentative understanding of the core issue.
    Insight,

    /// Confirm understanding and hand off to option generation.
    Closing,
}

impl ConversationPhase {
    /// All phases in conversation order.
    pub const ALL: [ConversationPhase; 5] = [
        Self::Opening,
        Self::Exploration,
        Self::Deepening,
        Self::Insight,
        Self::Closing,
    ];

    /// Returns the immediate successor, or `None` at `Closing`.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Opening => Some(Self::Exploration),
            Self::Exploration => Some(Self::Deepening),
            Self::Deepening => Some(Self::Insight),
            Self::Insight => Some(Self::Closing),
            Self::Closing => None,
        }
    }

    /// Returns the moves a coach turn may take in this phase.
    pub fn allowed_moves(&self) -> &'static [ResponseMove] {
        use ResponseMove::*;
        match self {
            Self::Opening => &[Reflection, DeepeningQuestion],
            Self::Exploration => &[Reflection, DeepeningQuestion, Observation],
            Self::Deepening => &[
                Reflection,
                Observation,
                Challenge,
                Synthesis,
                DeepeningQuestion,
            ],
            Self::Insight => &[Synthesis, Insight, Reflection],
            Self::Closing => &[Synthesis, Transition, Insight],
        }
    }

    /// Returns true if `response_move` is whitelisted for this phase.
    pub fn allows(&self, response_move: ResponseMove) -> bool {
        self.allowed_moves().contains(&response_move)
    }

    /// Upper-case label used in generation instructions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Opening => "OPENING",
            Self::Exploration => "EXPLORATION",
            Self::Deepening => "DEEPENING",
            Self::Insight => "INSIGHT",
            Self::Closing => "CLOSING",
        }
    }

    /// The coach's primary goal in this phase.
    pub fn goal(&self) -> &'static str {
        match self {
            Self::Opening => {
                "Understand the surface situation and identify two or three threads worth exploring."
            }
            Self::Exploration => {
                "Pick the most promising thread and follow it until its emotional weight is clear."
            }
            Self::Deepening => {
                "Name what you are noticing and surface the core tension or pattern."
            }
            Self::Insight => {
                "Offer a tentative understanding of the core issue and a possible reframe."
            }
            Self::Closing => {
                "Confirm the shared understanding and prepare to move on to options."
            }
        }
    }
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl StateMachine for ConversationPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.next() == Some(*target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        self.next().into_iter().collect()
    }
}
