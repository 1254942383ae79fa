//! Rule-based pattern detection over a single user message.
//!
//! Produces candidate threads, candidate observations, depth updates for
//! threads the message touches, and a dominant-emotion label. Generated
//! enrichment can be merged on top with [`PatternAnalysis::merge_enrichment`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::message::ChatMessage;
use super::observation::ObservationKind;
use super::state::ConversationState;
use super::thread::{topics_overlap, EmotionalIntensity, Thread, ThreadType};
use crate::domain::foundation::{ThreadId, UnitScore};

const MAX_EMOTIONAL_THREADS: usize = 3;
const MAX_VALUE_THREADS: usize = 2;
const MAX_CONTRADICTIONS: usize = 2;
const MAX_RECURRING_THEMES: usize = 2;

const EMOTIONAL_TOPIC_CHARS: usize = 50;
const VALUE_TOPIC_CHARS: usize = 40;
const MIN_TOPIC_CHARS: usize = 4;

/// History length before recurring themes are counted.
const MIN_HISTORY_FOR_REPETITION: usize = 4;
const RECURRENCE_THRESHOLD: usize = 3;

const NEUTRAL_EMOTION: &str = "neutral";

/// Intensity markers, strongest level first. The first match wins.
const INTENSITY_MARKERS: [(EmotionalIntensity, &[&str]); 3] = [
    (
        EmotionalIntensity::Critical,
        &[
            "terrified",
            "desperate",
            "hate",
            "love",
            "obsessed",
            "meaningless",
            "pointless",
            "hopeless",
            "devastating",
        ],
    ),
    (
        EmotionalIntensity::High,
        &[
            "really",
            "very",
            "extremely",
            "always",
            "never",
            "frustrated",
            "angry",
            "anxious",
            "scared",
            "worried",
            "stuck",
            "trapped",
            "lost",
            "confused",
            "overwhelmed",
        ],
    ),
    (
        EmotionalIntensity::Medium,
        &[
            "kind of",
            "somewhat",
            "a bit",
            "unsure",
            "maybe",
            "thinking about",
            "considering",
            "wonder",
        ],
    ),
];

const VALUE_INDICATORS: [&str; 10] = [
    "important",
    "matters",
    "priority",
    "value",
    "care about",
    "need",
    "must",
    "have to",
    "want",
    "wish",
];

const NEGATIONS: [&str; 5] = ["don't", "doesn't", "not", "never", "no longer"];
const AFFIRMATIONS: [&str; 5] = ["want", "need", "like", "enjoy", "love"];

const SIGNIFICANT_WORDS: [&str; 16] = [
    "stuck",
    "pointless",
    "meaningless",
    "connection",
    "alone",
    "lost",
    "confused",
    "frustrated",
    "want",
    "need",
    "afraid",
    "scared",
    "worried",
    "happy",
    "excited",
    "hope",
];

/// Words that end a captured phrase: the topic is what comes before them.
const CLAUSE_BREAKS: [&str; 9] = [
    "but", "because", "and", "so", "when", "since", "though", "although", "if",
];

/// Prepositions that additionally end an emotional capture
/// ("stuck in my job" names the feeling "stuck").
const FEELING_BREAKS: [&str; 7] = ["in", "at", "with", "about", "by", "for", "of"];

static EMOTIONAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bi feel (?:like |that )?([\w\s]+)",
        r"\bit feels (?:like |that )?([\w\s]+)",
        r"\bi(?:['’]m| am) ([\w\s]+)",
        r"\bi(?:['’]ve| have) been ([\w\s]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("emotional pattern compiles"))
    .collect()
});

static CONTRADICTION_SIGNALS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"want.*but", "wants X but Y"),
        (r"should.*but", "feels they should but"),
        (r"i know.*but", "knows X but does Y"),
        (r"on one hand.*other", "internal conflict"),
    ]
    .iter()
    .map(|(p, label)| (Regex::new(p).expect("contradiction pattern compiles"), *label))
    .collect()
});

static VALUE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    VALUE_INDICATORS
        .iter()
        .map(|indicator| {
            let pattern = format!(r"{}s? (?:to |about |is )?([\w\s]+)", regex::escape(indicator));
            (
                *indicator,
                Regex::new(&pattern).expect("value pattern compiles"),
            )
        })
        .collect()
});

/// A thread candidate found in a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedThread {
    pub topic: String,
    #[serde(rename = "type")]
    pub thread_type: ThreadType,
    pub emotional_intensity: EmotionalIntensity,
    pub relevance_score: UnitScore,
    pub quote: Option<String>,
}

/// An observation candidate found in a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObservation {
    #[serde(rename = "type")]
    pub kind: ObservationKind,
    pub text: String,
    pub confidence: UnitScore,
    pub supporting_quotes: Vec<String>,
}

/// Everything detected in one message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub new_threads: Vec<DetectedThread>,
    pub new_observations: Vec<DetectedObservation>,
    pub updated_thread_depths: BTreeMap<ThreadId, u8>,
    pub dominant_emotion: Option<String>,
}

impl PatternAnalysis {
    /// Merges generated findings, discarding duplicates of what is already here.
    ///
    /// Depth updates stay rule-based. A generated emotion label only replaces
    /// a neutral rule-based one.
    pub fn merge_enrichment(&mut self, enrichment: PatternAnalysis) {
        for thread in enrichment.new_threads {
            let duplicate = self
                .new_threads
                .iter()
                .any(|t| topics_overlap(&thread.topic, &t.topic));
            if !duplicate && !thread.topic.trim().is_empty() {
                self.new_threads.push(thread);
            }
        }

        for observation in enrichment.new_observations {
            let duplicate = self.new_observations.iter().any(|o| {
                o.kind == observation.kind && super::normalize(&o.text) == super::normalize(&observation.text)
            });
            if !duplicate && !observation.text.trim().is_empty() {
                self.new_observations.push(observation);
            }
        }

        let rule_is_neutral = self
            .dominant_emotion
            .as_deref()
            .map_or(true, |e| e == NEUTRAL_EMOTION);
        if rule_is_neutral {
            if let Some(emotion) = enrichment.dominant_emotion.filter(|e| !e.trim().is_empty()) {
                self.dominant_emotion = Some(emotion);
            }
        }
    }
}

/// Keyword and regex heuristics over the incoming message.
///
/// Always available; needs no network access.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternDetector;

impl PatternDetector {
    pub fn new() -> Self {
        Self
    }

    /// Analyzes `message` against the prior `history` and current `state`.
    pub fn analyze(
        &self,
        message: &str,
        history: &[ChatMessage],
        state: &ConversationState,
    ) -> PatternAnalysis {
        let lower = message.to_lowercase();
        let (intensity, emotion) = detect_emotion(&lower);

        let mut new_threads = emotional_threads(message, &lower, intensity);
        new_threads.extend(value_threads(message, &lower));

        let prior_user: Vec<String> = history
            .iter()
            .filter(|m| m.is_user())
            .map(|m| m.content.to_lowercase())
            .collect();

        let mut new_observations = Vec::new();
        if !prior_user.is_empty() {
            new_observations.extend(contradictions(&lower, &prior_user));
        }
        if history.len() >= MIN_HISTORY_FOR_REPETITION {
            new_observations.extend(recurring_themes(&lower, &prior_user));
        }

        PatternAnalysis {
            new_threads,
            new_observations,
            updated_thread_depths: touched_threads(&lower, state),
            dominant_emotion: Some(emotion.to_string()),
        }
    }
}

/// Finds the first intensity marker, strongest level first.
pub fn detect_emotion(lower: &str) -> (EmotionalIntensity, &'static str) {
    for (intensity, markers) in INTENSITY_MARKERS {
        if let Some(marker) = markers.iter().find(|m| lower.contains(*m)) {
            return (intensity, marker_emotion(marker));
        }
    }
    (EmotionalIntensity::Medium, NEUTRAL_EMOTION)
}

fn marker_emotion(marker: &str) -> &'static str {
    match marker {
        "terrified" | "desperate" | "anxious" | "scared" | "worried" | "overwhelmed" => "anxious",
        "hate" | "frustrated" | "angry" | "stuck" | "trapped" => "frustrated",
        "love" => "excited",
        "meaningless" | "pointless" | "hopeless" => "sad",
        "lost" | "confused" => "confused",
        _ => NEUTRAL_EMOTION,
    }
}

fn emotional_threads(
    message: &str,
    lower: &str,
    intensity: EmotionalIntensity,
) -> Vec<DetectedThread> {
    let mut threads = Vec::new();

    for pattern in EMOTIONAL_PATTERNS.iter() {
        for captures in pattern.captures_iter(lower) {
            let Some(raw) = captures.get(1) else { continue };
            let phrase = cut_phrase(raw.as_str(), &[&CLAUSE_BREAKS, &FEELING_BREAKS]);
            let topic = truncate_chars(&phrase, EMOTIONAL_TOPIC_CHARS);
            if topic.chars().count() < MIN_TOPIC_CHARS {
                continue;
            }
            threads.push(DetectedThread {
                quote: Some(extract_quote(message, &topic)),
                topic: format!("feeling {}", topic),
                thread_type: ThreadType::Emotional,
                emotional_intensity: intensity,
                relevance_score: UnitScore::new(0.7),
            });
        }
    }

    threads.truncate(MAX_EMOTIONAL_THREADS);
    threads
}

fn value_threads(message: &str, lower: &str) -> Vec<DetectedThread> {
    let mut threads = Vec::new();

    for (indicator, pattern) in VALUE_PATTERNS.iter() {
        if !lower.contains(indicator) {
            continue;
        }
        for captures in pattern.captures_iter(lower) {
            let Some(raw) = captures.get(1) else { continue };
            let phrase = cut_phrase(raw.as_str(), &[&CLAUSE_BREAKS]);
            let value = truncate_chars(&phrase, VALUE_TOPIC_CHARS);
            if value.chars().count() < MIN_TOPIC_CHARS {
                continue;
            }
            threads.push(DetectedThread {
                quote: Some(extract_quote(message, &value)),
                topic: format!("values {}", value),
                thread_type: ThreadType::Value,
                emotional_intensity: EmotionalIntensity::Medium,
                relevance_score: UnitScore::new(0.8),
            });
        }
    }

    threads.truncate(MAX_VALUE_THREADS);
    threads
}

fn contradictions(lower: &str, prior_user: &[String]) -> Vec<DetectedObservation> {
    let mut found: Vec<DetectedObservation> = Vec::new();
    let mut push = |observation: DetectedObservation| {
        if !found.iter().any(|o| o.text == observation.text) {
            found.push(observation);
        }
    };

    for (pattern, label) in CONTRADICTION_SIGNALS.iter() {
        if pattern.is_match(lower) {
            push(DetectedObservation {
                kind: ObservationKind::Contradiction,
                text: format!("User shows internal conflict: {}", label),
                confidence: UnitScore::new(0.7),
                supporting_quotes: vec![truncate_chars(lower, 100)],
            });
        }
    }

    for negation in NEGATIONS {
        for affirmation in AFFIRMATIONS {
            if !lower.contains(&format!("{} {}", negation, affirmation)) {
                continue;
            }
            let earlier = prior_user
                .iter()
                .find(|prev| prev.contains(affirmation) && !prev.contains(negation));
            if let Some(prev) = earlier {
                push(DetectedObservation {
                    kind: ObservationKind::Contradiction,
                    text: format!(
                        "Previously expressed '{}' positively, now negatively",
                        affirmation
                    ),
                    confidence: UnitScore::new(0.6),
                    supporting_quotes: vec![truncate_chars(prev, 100), truncate_chars(lower, 100)],
                });
            }
        }
    }

    found.truncate(MAX_CONTRADICTIONS);
    found
}

fn recurring_themes(lower: &str, prior_user: &[String]) -> Vec<DetectedObservation> {
    let mut user_text = prior_user.join(" ");
    user_text.push(' ');
    user_text.push_str(lower);

    SIGNIFICANT_WORDS
        .iter()
        .filter_map(|word| {
            let count = user_text.matches(word).count();
            (count >= RECURRENCE_THRESHOLD).then(|| DetectedObservation {
                kind: ObservationKind::Pattern,
                text: format!("'{}' mentioned {} times - recurring theme", word, count),
                confidence: UnitScore::new((0.5 + count as f64 * 0.1).min(0.9)),
                supporting_quotes: Vec::new(),
            })
        })
        .take(MAX_RECURRING_THEMES)
        .collect()
}

/// Threads whose topic words (longer than three chars) appear in the message.
fn touched_threads(lower: &str, state: &ConversationState) -> BTreeMap<ThreadId, u8> {
    state
        .active_threads
        .iter()
        .filter(|thread| {
            thread
                .topic
                .to_lowercase()
                .split_whitespace()
                .filter(|w| w.chars().count() > 3)
                .any(|w| lower.contains(w))
        })
        .map(|thread| {
            let depth = thread.exploration_depth.saturating_add(1).min(Thread::MAX_DEPTH);
            (thread.id.clone(), depth)
        })
        .collect()
}

/// Keeps the words before the first break word of any list.
fn cut_phrase(raw: &str, breaks: &[&[&str]]) -> String {
    raw.split_whitespace()
        .take_while(|word| !breaks.iter().any(|list| list.contains(word)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect::<String>().trim().to_string()
}

/// Roughly 20 chars before and 50 after the keyword, or the first 100 chars.
fn extract_quote(message: &str, keyword: &str) -> String {
    let lower = message.to_lowercase();
    // Lowercasing can change byte lengths; quote from the lowered text then.
    let source = if lower.len() == message.len() {
        message
    } else {
        lower.as_str()
    };

    let Some(idx) = lower.find(&keyword.to_lowercase()) else {
        return truncate_chars(message, 100);
    };

    let start = floor_boundary(source, idx.saturating_sub(20));
    let end = ceil_boundary(source, (idx + keyword.len() + 50).min(source.len()));
    source[start..end].trim().to_string()
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
