//! Observations: inferred patterns worth reflecting back to the user.

use serde::{Deserialize, Serialize};

use super::normalize;
use crate::domain::foundation::{ObservationId, UnitScore};

/// What kind of inference an observation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    #[default]
    Pattern,
    Contradiction,
    Value,
    Emotion,
    Reframe,
}

impl ObservationKind {
    /// Lower-case label used in generation instructions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Contradiction => "contradiction",
            Self::Value => "value",
            Self::Emotion => "emotion",
            Self::Reframe => "reframe",
        }
    }

    /// Parses a generated label; unknown labels become `Pattern`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contradiction" => Self::Contradiction,
            "value" => Self::Value,
            "emotion" => Self::Emotion,
            "reframe" => Self::Reframe,
            _ => Self::Pattern,
        }
    }
}

/// A detected pattern, contradiction, value or emotion.
///
/// # Invariants
///
/// - once `surfaced` is true it stays true
/// - `surfaced_at_exchange` is set exactly when `surfaced` first flips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    #[serde(rename = "type", default)]
    pub kind: ObservationKind,
    pub text: String,
    #[serde(default)]
    pub confidence: UnitScore,
    #[serde(default)]
    pub supporting_quotes: Vec<String>,
    #[serde(default)]
    pub surfaced: bool,
    #[serde(default)]
    pub surfaced_at_exchange: Option<u32>,
    #[serde(default)]
    pub detected_at_exchange: u32,
    #[serde(default)]
    pub user_confirmed: Option<bool>,
}

impl Observation {
    /// Minimum confidence for an observation to be shared with the user.
    pub const SURFACING_THRESHOLD: f64 = 0.6;

    /// Creates an unsurfaced observation detected at `exchange`.
    pub fn new(
        id: ObservationId,
        kind: ObservationKind,
        text: impl Into<String>,
        confidence: UnitScore,
        exchange: u32,
    ) -> Self {
        Self {
            id,
            kind,
            text: text.into(),
            confidence,
            supporting_quotes: Vec::new(),
            surfaced: false,
            surfaced_at_exchange: None,
            detected_at_exchange: exchange,
            user_confirmed: None,
        }
    }

    /// Attaches supporting quotes.
    pub fn with_quotes(mut self, quotes: Vec<String>) -> Self {
        self.supporting_quotes = quotes;
        self
    }

    /// True if confident enough to share and not yet shared.
    pub fn is_ready_to_surface(&self) -> bool {
        !self.surfaced && self.confidence.value() >= Self::SURFACING_THRESHOLD
    }

    /// Marks the observation as shared. Idempotent: returns false and keeps
    /// the original exchange if it was already surfaced.
    pub fn mark_surfaced(&mut self, exchange: u32) -> bool {
        if self.surfaced {
            return false;
        }
        self.surfaced = true;
        self.surfaced_at_exchange = Some(exchange);
        true
    }

    /// Returns true if `text` says the same thing as this observation.
    pub fn has_same_text(&self, text: &str) -> bool {
        normalize(&self.text) == normalize(text)
    }
}
