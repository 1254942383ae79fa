//! Structured replies returned by the generator.
//!
//! Generated JSON is loosely shaped: fields go missing, come back `null`, or
//! carry labels outside the closed enums. These DTOs accept all of that and
//! convert into domain values with safe fallbacks.

use serde::{Deserialize, Deserializer, Serialize};

use super::detector::{DetectedObservation, DetectedThread, PatternAnalysis};
use super::moves::ResponseMove;
use super::observation::ObservationKind;
use super::thread::{EmotionalIntensity, ThreadType};
use crate::domain::foundation::UnitScore;

const DEFAULT_THREAD_RELEVANCE: f64 = 0.5;
const DEFAULT_OBSERVATION_CONFIDENCE: f64 = 0.7;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A thread declared by the generator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyThread {
    #[serde(deserialize_with = "null_as_default")]
    pub topic: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub thread_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub emotional_intensity: String,
    pub relevance_score: Option<f64>,
    #[serde(alias = "quote")]
    pub supporting_quote: Option<String>,
}

impl ReplyThread {
    /// `None` when the topic is blank.
    pub fn to_detected(&self) -> Option<DetectedThread> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return None;
        }
        Some(DetectedThread {
            topic: topic.to_string(),
            thread_type: ThreadType::parse_lenient(&self.thread_type),
            emotional_intensity: EmotionalIntensity::parse_lenient(&self.emotional_intensity),
            relevance_score: UnitScore::new(self.relevance_score.unwrap_or(DEFAULT_THREAD_RELEVANCE)),
            quote: self
                .supporting_quote
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
        })
    }
}

/// An observation declared by the generator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyObservation {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
    pub confidence: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub supporting_quotes: Vec<String>,
}

impl ReplyObservation {
    /// `None` when the text is blank.
    pub fn to_detected(&self) -> Option<DetectedObservation> {
        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }
        Some(DetectedObservation {
            kind: ObservationKind::parse_lenient(&self.kind),
            text: text.to_string(),
            confidence: UnitScore::new(self.confidence.unwrap_or(DEFAULT_OBSERVATION_CONFIDENCE)),
            supporting_quotes: self.supporting_quotes.clone(),
        })
    }
}

/// One generated coach turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachReply {
    #[serde(deserialize_with = "null_as_default")]
    pub response: String,
    #[serde(deserialize_with = "null_as_default")]
    pub response_move: String,
    #[serde(deserialize_with = "null_as_default")]
    pub threads_detected: Vec<ReplyThread>,
    #[serde(deserialize_with = "null_as_default")]
    pub observations_detected: Vec<ReplyObservation>,
    #[serde(deserialize_with = "null_as_default")]
    pub synthesis_points: Vec<String>,
    pub core_issue: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub should_transition: bool,
    pub transition_reason: Option<String>,
    pub question_reason: Option<String>,
    pub suggested_options: Option<Vec<String>>,
}

impl CoachReply {
    /// Reads a reply out of generated JSON.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// The declared move; unknown labels become `DeepeningQuestion`.
    pub fn declared_move(&self) -> ResponseMove {
        ResponseMove::parse_lenient(&self.response_move)
    }

    pub fn detected_threads(&self) -> Vec<DetectedThread> {
        self.threads_detected
            .iter()
            .filter_map(ReplyThread::to_detected)
            .collect()
    }

    pub fn detected_observations(&self) -> Vec<DetectedObservation> {
        self.observations_detected
            .iter()
            .filter_map(ReplyObservation::to_detected)
            .collect()
    }

    /// Core issue text, if the reply named one.
    pub fn core_issue(&self) -> Option<&str> {
        self.core_issue
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
    }
}

/// Generated pattern analysis used to enrich rule-based detection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentReply {
    #[serde(deserialize_with = "null_as_default")]
    pub new_threads: Vec<ReplyThread>,
    #[serde(deserialize_with = "null_as_default")]
    pub new_observations: Vec<ReplyObservation>,
    pub dominant_emotion: Option<String>,
}

impl EnrichmentReply {
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Converts into an analysis. Depth updates are never taken from
    /// generated output.
    pub fn into_analysis(self) -> PatternAnalysis {
        PatternAnalysis {
            new_threads: self
                .new_threads
                .iter()
                .filter_map(ReplyThread::to_detected)
                .collect(),
            new_observations: self
                .new_observations
                .iter()
                .filter_map(ReplyObservation::to_detected)
                .collect(),
            updated_thread_depths: Default::default(),
            dominant_emotion: self
                .dominant_emotion
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty() && e != "null"),
        }
    }
}
