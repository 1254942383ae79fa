//! Reply Generator Port - structured generation for coach turns.
//!
//! Takes instructions plus the user message and returns a JSON value of the
//! expected shape. Implementations own their parse-retry budget; once it is
//! spent the failure is reported as [`GenerationError::MalformedOutput`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::foundation::SessionId;
use crate::ports::{AIError, TokenUsage};

/// Port for generating structured replies.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest)
        -> Result<GenerationOutput, GenerationError>;
}

/// The JSON shape a generation call must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedShape {
    /// A coach turn: `response` plus `response_move` and optional extras.
    CoachReply,
    /// Threads, observations and an emotion label.
    PatternAnalysis,
}

impl ExpectedShape {
    /// Top-level keys a value must carry to count as this shape.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::CoachReply => &["response", "response_move"],
            Self::PatternAnalysis => &[],
        }
    }

    /// Names the first required key missing from `value`.
    pub fn missing_field(&self, value: &serde_json::Value) -> Option<&'static str> {
        let Some(object) = value.as_object() else {
            return Some("<object>");
        };
        self.required_fields()
            .iter()
            .copied()
            .find(|field| !object.contains_key(*field))
    }
}

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub instructions: String,
    pub user_message: String,
    pub expected_shape: ExpectedShape,
    pub session_id: Option<SessionId>,
}

impl GenerationRequest {
    pub fn new(
        instructions: impl Into<String>,
        user_message: impl Into<String>,
        expected_shape: ExpectedShape,
    ) -> Self {
        Self {
            instructions: instructions.into(),
            user_message: user_message.into(),
            expected_shape,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// SHA-256 of instructions and message, hex encoded.
    pub fn prompt_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.instructions.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.user_message.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Structured reply plus metadata.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub value: serde_json::Value,
    pub metadata: GenerationMetadata,
}

/// Where and how a reply was generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub model: String,
    pub prompt_hash: String,
    pub usage: TokenUsage,
    /// Provider calls spent, including parse retries.
    pub provider_calls: u32,
    pub completed_at: DateTime<Utc>,
}

/// Generation failures.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The model backend failed.
    #[error("provider failed: {0}")]
    Provider(#[from] AIError),

    /// Output never matched the expected shape within the retry budget.
    #[error("malformed output after {attempts} attempt(s): {reason}")]
    MalformedOutput { attempts: u32, reason: String },
}

impl GenerationError {
    pub fn malformed(attempts: u32, reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            attempts,
            reason: reason.into(),
        }
    }

    pub fn is_malformed_output(&self) -> bool {
        matches!(self, Self::MalformedOutput { .. })
    }
}
