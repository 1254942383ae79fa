//! Thread priority scoring.
//!
//! Ranks threads by the expected value of exploring them further:
//! emotionally charged, relevant, shallow, recently touched threads first.

use super::thread::Thread;
use crate::domain::foundation::ThreadId;

const INTENSITY_WEIGHT: f64 = 0.35;
const RELEVANCE_WEIGHT: f64 = 0.30;
const DEPTH_WEIGHT: f64 = 0.20;
const RECENCY_WEIGHT: f64 = 0.15;

/// Points lost per exploration level.
const DEPTH_PENALTY: f64 = 40.0;
/// Points lost per exchange since the thread was last touched.
const RECENCY_DECAY: f64 = 20.0;

/// Weighted-sum priority scorer for threads.
///
/// Pure: the score depends only on the thread and the current exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPriorityScorer;

impl ThreadPriorityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Scores a thread on a 0-100 scale.
    pub fn score(&self, thread: &Thread, current_exchange: u32) -> f64 {
        let intensity = thread.emotional_intensity.weight();
        let relevance = thread.relevance_score.as_percent();
        let depth = (100.0 - f64::from(thread.exploration_depth) * DEPTH_PENALTY).max(0.0);
        // A thread touched "in the future" (replayed state) counts as fresh.
        let elapsed = current_exchange.saturating_sub(thread.last_touched_exchange);
        let recency = (100.0 - f64::from(elapsed) * RECENCY_DECAY).max(0.0);

        let score = INTENSITY_WEIGHT * intensity
            + RELEVANCE_WEIGHT * relevance
            + DEPTH_WEIGHT * depth
            + RECENCY_WEIGHT * recency;

        score.clamp(0.0, 100.0)
    }

    /// Returns threads with their scores, highest first, skipping completed ids.
    ///
    /// Ties keep their original order.
    pub fn rank<'a>(
        &self,
        threads: &'a [Thread],
        completed: &[ThreadId],
        current_exchange: u32,
    ) -> Vec<(&'a Thread, f64)> {
        let mut ranked: Vec<(&Thread, f64)> = threads
            .iter()
            .filter(|t| !completed.contains(&t.id))
            .map(|t| (t, self.score(t, current_exchange)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// The exploration target: highest-scoring non-completed thread.
    pub fn best<'a>(
        &self,
        threads: &'a [Thread],
        completed: &[ThreadId],
        current_exchange: u32,
    ) -> Option<&'a Thread> {
        self.rank(threads, completed, current_exchange)
            .into_iter()
            .next()
            .map(|(t, _)| t)
    }
}
