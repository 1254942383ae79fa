//! State Storage Port - Interface for persisting conversation state.
//!
//! Conversation state is a flat JSON document keyed by session. Absence of a
//! document is a fresh conversation, not an error.

use async_trait::async_trait;

use crate::domain::coaching::ConversationState;
use crate::domain::foundation::SessionId;

/// Errors that can occur during state storage operations
#[derive(Debug, thiserror::Error)]
pub enum StateStorageError {
    #[error("Failed to serialize state: {0}")]
    SerializationFailed(String),

    /// The stored document exists but cannot be read as state.
    #[error("Corrupt state for session {session_id}: {reason}")]
    Corrupt { session_id: SessionId, reason: String },

    #[error("IO error: {0}")]
    IoError(String),
}

impl StateStorageError {
    pub fn corrupt(session_id: SessionId, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            session_id,
            reason: reason.into(),
        }
    }

    /// True when the document is unreadable but the store itself works.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Port for persisting and loading conversation state
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Loads the state for a session.
    ///
    /// # Returns
    /// `None` when nothing was saved for the session yet.
    ///
    /// # Errors
    /// `StateStorageError::Corrupt` if a document exists but does not parse.
    async fn load(&self, session_id: SessionId)
        -> Result<Option<ConversationState>, StateStorageError>;

    /// Saves the state for a session, replacing any previous document.
    async fn save(
        &self,
        session_id: SessionId,
        state: &ConversationState,
    ) -> Result<(), StateStorageError>;

    /// Check if state exists for a session
    async fn exists(&self, session_id: SessionId) -> Result<bool, StateStorageError>;

    /// Delete the state for a session. Deleting a missing session is a no-op.
    async fn delete(&self, session_id: SessionId) -> Result<(), StateStorageError>;
}
