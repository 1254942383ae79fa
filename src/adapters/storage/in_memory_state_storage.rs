//! In-Memory State Storage Adapter
//!
//! Keeps each session's state as a serialized JSON document in memory, so
//! the same load/parse path as the file adapter is exercised.
//! Useful for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::coaching::ConversationState;
use crate::domain::foundation::SessionId;
use crate::ports::{StateStorage, StateStorageError};

/// In-memory storage for conversation state
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStorage {
    documents: Arc<RwLock<HashMap<SessionId, String>>>,
}

impl InMemoryStateStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw document for a session, bypassing serialization.
    pub async fn insert_raw(&self, session_id: SessionId, document: impl Into<String>) {
        self.documents
            .write()
            .await
            .insert(session_id, document.into());
    }

    /// Clear all stored data (useful for tests)
    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }

    /// Get the number of stored states
    pub async fn state_count(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl StateStorage for InMemoryStateStorage {
    async fn load(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ConversationState>, StateStorageError> {
        let documents = self.documents.read().await;
        documents
            .get(&session_id)
            .map(|json| {
                serde_json::from_str(json)
                    .map_err(|e| StateStorageError::corrupt(session_id, e.to_string()))
            })
            .transpose()
    }

    async fn save(
        &self,
        session_id: SessionId,
        state: &ConversationState,
    ) -> Result<(), StateStorageError> {
        let json = serde_json::to_string(state)
            .map_err(|e| StateStorageError::SerializationFailed(e.to_string()))?;
        self.documents.write().await.insert(session_id, json);
        Ok(())
    }

    async fn exists(&self, session_id: SessionId) -> Result<bool, StateStorageError> {
        Ok(self.documents.read().await.contains_key(&session_id))
    }

    async fn delete(&self, session_id: SessionId) -> Result<(), StateStorageError> {
        self.documents.write().await.remove(&session_id);
        Ok(())
    }
}
