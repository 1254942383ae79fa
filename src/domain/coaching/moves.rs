//! Response moves: the rhetorical function of one coach turn.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// What a single coach turn is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMove {
    /// Mirror back what the user said, naming emotions.
    Reflection,
    /// Point out a detected pattern or contradiction.
    Observation,
    /// Gently question an assumption. Used at most once per conversation.
    Challenge,
    /// Ask one question that goes deeper on the current thread.
    DeepeningQuestion,
    /// Pull together what has been learned so far.
    Synthesis,
    /// Offer a tentative reframe of the core issue.
    Insight,
    /// Hand off to the next stage of the product flow.
    Transition,
}

impl ResponseMove {
    /// All moves, in declaration order.
    pub const ALL: [ResponseMove; 7] = [
        Self::Reflection,
        Self::Observation,
        Self::Challenge,
        Self::DeepeningQuestion,
        Self::Synthesis,
        Self::Insight,
        Self::Transition,
    ];

    /// Upper snake-case label used in generation instructions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reflection => "REFLECTION",
            Self::Observation => "OBSERVATION",
            Self::Challenge => "CHALLENGE",
            Self::DeepeningQuestion => "DEEPENING_QUESTION",
            Self::Synthesis => "SYNTHESIS",
            Self::Insight => "INSIGHT",
            Self::Transition => "TRANSITION",
        }
    }

    /// Parses a generated move label, falling back to `DeepeningQuestion`.
    ///
    /// Generated replies spell labels loosely ("Deepening Question",
    /// "deepening-question"); anything unrecognised takes the fallback.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::DeepeningQuestion)
    }
}

impl FromStr for ResponseMove {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        Self::ALL
            .into_iter()
            .find(|m| m.label() == normalized)
            .ok_or_else(|| {
                ValidationError::invalid_format("response_move", format!("unknown move '{}'", s))
            })
    }
}

impl std::fmt::Display for ResponseMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
