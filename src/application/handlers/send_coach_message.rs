//! SendCoachMessageHandler - Command handler for one coaching turn.
//!
//! Loads the session's state (or starts fresh), runs the engine and saves
//! the updated state. Nothing is saved when the turn fails.

use std::sync::Arc;

use crate::application::engine::{CoachTurn, CoachingEngine, EngineError, TurnInput};
use crate::domain::coaching::{ChatMessage, ConversationState};
use crate::domain::foundation::SessionId;
use crate::ports::{StateStorage, StateStorageError};

/// Command to send a user message to the coach.
#[derive(Debug, Clone)]
pub struct SendCoachMessageCommand {
    pub session_id: SessionId,
    pub content: String,
    pub situation: String,
    pub chat_history: Vec<ChatMessage>,
}

impl SendCoachMessageCommand {
    pub fn new(
        session_id: SessionId,
        content: impl Into<String>,
        situation: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            content: content.into(),
            situation: situation.into(),
            chat_history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.chat_history = history;
        self
    }
}

/// Errors that can occur when sending a coach message.
#[derive(Debug, thiserror::Error)]
pub enum SendCoachMessageError {
    /// Message content is empty or whitespace only.
    #[error("Validation error: message content cannot be empty")]
    EmptyContent,

    #[error("Coaching turn failed: {0}")]
    Engine(#[from] EngineError),

    #[error("State storage error: {0}")]
    Storage(#[from] StateStorageError),
}

/// Handler for SendCoachMessage commands.
pub struct SendCoachMessageHandler {
    engine: Arc<CoachingEngine>,
    storage: Arc<dyn StateStorage>,
}

impl SendCoachMessageHandler {
    pub fn new(engine: Arc<CoachingEngine>, storage: Arc<dyn StateStorage>) -> Self {
        Self { engine, storage }
    }

    pub async fn handle(
        &self,
        cmd: SendCoachMessageCommand,
    ) -> Result<CoachTurn, SendCoachMessageError> {
        // 1. Validate content
        let content = cmd.content.trim();
        if content.is_empty() {
            return Err(SendCoachMessageError::EmptyContent);
        }

        // 2. Load state, starting fresh when nothing usable is stored
        let current = self.load_or_fresh(cmd.session_id).await?;

        // 3. Run the turn
        let input = TurnInput::new(content, cmd.situation)
            .with_history(cmd.chat_history)
            .with_session(cmd.session_id);
        let turn = self.engine.process_message(&input, current.as_ref()).await?;

        // 4. Persist
        self.storage.save(cmd.session_id, &turn.state).await?;

        tracing::info!(
            session_id = %cmd.session_id,
            phase = turn.state.current_phase.label(),
            response_move = turn.response_move.label(),
            attempts = turn.attempts,
            residual_issues = turn.residual_issues.len(),
            "Coach turn completed"
        );

        Ok(turn)
    }

    async fn load_or_fresh(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ConversationState>, StateStorageError> {
        match self.storage.load(session_id).await {
            Ok(state) => Ok(state),
            Err(err) if err.is_corrupt() => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %err,
                    "Stored conversation state is corrupt, starting fresh"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
