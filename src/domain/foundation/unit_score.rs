//! Unit score value object (0.0-1.0 scale).

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A fraction between 0.0 and 1.0 inclusive.
///
/// Used for thread relevance and observation confidence. Deserialization
/// clamps out-of-range values, so loosely generated replies still load.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct UnitScore(f64);

impl UnitScore {
    /// Zero.
    pub const ZERO: Self = Self(0.0);

    /// One.
    pub const ONE: Self = Self(1.0);

    /// Creates a new UnitScore, clamping to the valid range. NaN becomes zero.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Creates a UnitScore, returning error if out of range.
    pub fn try_new(value: f64) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::out_of_range("unit_score", 0.0, 1.0, value));
        }
        Ok(Self(value))
    }

    /// Returns the raw fraction.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Returns the value on a 0-100 scale.
    pub fn as_percent(&self) -> f64 {
        self.0 * 100.0
    }
}

impl Default for UnitScore {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<f64> for UnitScore {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<UnitScore> for f64 {
    fn from(score: UnitScore) -> Self {
        score.0
    }
}

impl fmt::Display for UnitScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
