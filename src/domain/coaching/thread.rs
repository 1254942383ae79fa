//! Threads: topics surfaced in conversation that may deserve deeper exploration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::normalize;
use crate::domain::foundation::{ThreadId, UnitScore};

/// How a thread entered the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThreadType {
    #[default]
    Mentioned,
    Emotional,
    Pattern,
    Contradiction,
    Value,
}

impl ThreadType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mentioned => "mentioned",
            Self::Emotional => "emotional",
            Self::Pattern => "pattern",
            Self::Contradiction => "contradiction",
            Self::Value => "value",
        }
    }

    /// Parses a generated label; unknown labels become `Mentioned`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "emotional" => Self::Emotional,
            "pattern" => Self::Pattern,
            "contradiction" => Self::Contradiction,
            "value" => Self::Value,
            _ => Self::Mentioned,
        }
    }
}

/// How emotionally charged a thread is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalIntensity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl EmotionalIntensity {
    /// Weight on the 0-100 scale used by thread scoring.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Low => 20.0,
            Self::Medium => 50.0,
            Self::High => 80.0,
            Self::Critical => 100.0,
        }
    }

    /// Lower-case label used in generation instructions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parses a generated label; unknown labels become `Medium`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Medium,
        }
    }
}

/// A topic worth exploring.
///
/// # Invariants
///
/// - `exploration_depth` never decreases and never exceeds [`Thread::MAX_DEPTH`]
/// - `last_touched_exchange >= first_mentioned_exchange`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub topic: String,
    #[serde(rename = "type", default)]
    pub thread_type: ThreadType,
    #[serde(default)]
    pub emotional_intensity: EmotionalIntensity,
    #[serde(default)]
    pub relevance_score: UnitScore,
    #[serde(default)]
    pub exploration_depth: u8,
    #[serde(default)]
    pub first_mentioned_exchange: u32,
    #[serde(default)]
    pub last_touched_exchange: u32,
    #[serde(default)]
    pub related_quotes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Thread {
    /// Depth at which a thread counts as fully explored.
    pub const MAX_DEPTH: u8 = 3;

    /// Creates an unexplored thread first seen at `exchange`.
    pub fn new(
        id: ThreadId,
        topic: impl Into<String>,
        thread_type: ThreadType,
        emotional_intensity: EmotionalIntensity,
        relevance_score: UnitScore,
        exchange: u32,
    ) -> Self {
        Self {
            id,
            topic: topic.into(),
            thread_type,
            emotional_intensity,
            relevance_score,
            exploration_depth: 0,
            first_mentioned_exchange: exchange,
            last_touched_exchange: exchange,
            related_quotes: Vec::new(),
            notes: None,
        }
    }

    /// Attaches a supporting quote, ignoring blanks.
    pub fn with_quote(mut self, quote: impl Into<String>) -> Self {
        let quote = quote.into();
        if !quote.trim().is_empty() {
            self.related_quotes.push(quote);
        }
        self
    }

    /// Raises exploration depth to `depth` (capped) and marks the thread touched.
    ///
    /// Returns true if the depth changed. A lower depth is ignored, but the
    /// thread still counts as touched.
    pub fn deepen_to(&mut self, depth: u8, exchange: u32) -> bool {
        self.last_touched_exchange = self.last_touched_exchange.max(exchange);
        let capped = depth.min(Self::MAX_DEPTH);
        if capped > self.exploration_depth {
            self.exploration_depth = capped;
            true
        } else {
            false
        }
    }

    /// True once the thread has been probed to the depth cap.
    pub fn is_fully_explored(&self) -> bool {
        self.exploration_depth >= Self::MAX_DEPTH
    }

    /// Human-readable exploration depth.
    pub fn depth_label(&self) -> &'static str {
        match self.exploration_depth {
            0 => "mentioned",
            1 => "asked once",
            _ => "explored deeply",
        }
    }

    /// Returns true if `candidate` names the same topic as this thread.
    pub fn covers_topic(&self, candidate: &str) -> bool {
        topics_overlap(candidate, &self.topic)
    }
}

/// Duplicate check between a candidate topic and an existing one.
///
/// Same normalized text, or at least half of the candidate's words
/// already appear in the existing topic.
pub fn topics_overlap(candidate: &str, existing: &str) -> bool {
    let candidate = normalize(candidate);
    let existing = normalize(existing);
    if candidate == existing {
        return true;
    }

    let candidate_words: HashSet<&str> = candidate.split_whitespace().collect();
    if candidate_words.is_empty() {
        return false;
    }
    let existing_words: HashSet<&str> = existing.split_whitespace().collect();
    let shared = candidate_words.intersection(&existing_words).count();

    shared * 2 >= candidate_words.len()
}
