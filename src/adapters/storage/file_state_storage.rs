//! File-based State Storage Adapter
//!
//! Stores conversation state as pretty-printed JSON files on disk, one
//! directory per session: `{base}/{session_id}/state.json`.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::coaching::ConversationState;
use crate::domain::foundation::SessionId;
use crate::ports::{StateStorage, StateStorageError};

const STATE_FILE: &str = "state.json";

/// File-based storage for conversation state
#[derive(Debug, Clone)]
pub struct FileStateStorage {
    base_path: PathBuf,
}

impl FileStateStorage {
    /// Create a new file storage with a base directory
    ///
    /// # Example
    /// ```ignore
    /// let storage = FileStateStorage::new("./data/conversations");
    /// ```
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Get the directory path for a specific session
    fn session_dir(&self, session_id: SessionId) -> PathBuf {
        self.base_path.join(session_id.to_string())
    }

    /// Get the state file path for a session
    fn state_file_path(&self, session_id: SessionId) -> PathBuf {
        self.session_dir(session_id).join(STATE_FILE)
    }

    async fn ensure_dir(&self, path: &Path) -> Result<(), StateStorageError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| StateStorageError::IoError(e.to_string()))
    }
}

#[async_trait]
impl StateStorage for FileStateStorage {
    async fn load(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ConversationState>, StateStorageError> {
        let file_path = self.state_file_path(session_id);

        let json = match fs::read_to_string(&file_path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateStorageError::IoError(e.to_string())),
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StateStorageError::corrupt(session_id, e.to_string()))
    }

    async fn save(
        &self,
        session_id: SessionId,
        state: &ConversationState,
    ) -> Result<(), StateStorageError> {
        let dir = self.session_dir(session_id);
        self.ensure_dir(&dir).await?;

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StateStorageError::SerializationFailed(e.to_string()))?;

        // Write then rename so a crash never leaves a half-written document.
        let tmp_path = dir.join(format!("{}.tmp", STATE_FILE));
        fs::write(&tmp_path, json)
            .await
            .map_err(|e| StateStorageError::IoError(e.to_string()))?;
        fs::rename(&tmp_path, self.state_file_path(session_id))
            .await
            .map_err(|e| StateStorageError::IoError(e.to_string()))?;

        tracing::debug!(session_id = %session_id, "Saved conversation state");
        Ok(())
    }

    async fn exists(&self, session_id: SessionId) -> Result<bool, StateStorageError> {
        match fs::metadata(self.state_file_path(session_id)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StateStorageError::IoError(e.to_string())),
        }
    }

    async fn delete(&self, session_id: SessionId) -> Result<(), StateStorageError> {
        match fs::remove_dir_all(self.session_dir(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateStorageError::IoError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coaching::{ConversationPhase, DetectedThread, ThreadType};
    use crate::domain::coaching::EmotionalIntensity;
    use crate::domain::foundation::UnitScore;
    use tempfile::TempDir;

    fn test_state() -> ConversationState {
        let mut state = ConversationState::new();
        state.record_exchange();
        state.add_thread(&DetectedThread {
            topic: "feeling stuck".to_string(),
            thread_type: ThreadType::Emotional,
            emotional_intensity: EmotionalIntensity::High,
            relevance_score: UnitScore::new(0.9),
            quote: Some("I feel stuck in my job".to_string()),
        });
        state
    }

    #[tokio::test]
    async fn save_and_load_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStateStorage::new(temp_dir.path());
        let session = SessionId::new();
        let state = test_state();

        storage.save(session, &state).await.unwrap();
        let loaded = storage.load(session).await.unwrap();

        assert_eq!(loaded, Some(state));
    }

    #[tokio::test]
    async fn load_missing_session_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStateStorage::new(temp_dir.path());

        assert_eq!(storage.load(SessionId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unreadable_document_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStateStorage::new(temp_dir.path());
        let session = SessionId::new();

        std::fs::create_dir_all(storage.session_dir(session)).unwrap();
        std::fs::write(storage.state_file_path(session), "{ not json").unwrap();

        let err = storage.load(session).await.unwrap_err();
        assert!(err.is_corrupt());
    }

    #[tokio::test]
    async fn partial_document_loads_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStateStorage::new(temp_dir.path());
        let session = SessionId::new();

        std::fs::create_dir_all(storage.session_dir(session)).unwrap();
        std::fs::write(
            storage.state_file_path(session),
            r#"{"current_phase": "exploration", "total_exchange_count": 4}"#,
        )
        .unwrap();

        let loaded = storage.load(session).await.unwrap().unwrap();
        assert_eq!(loaded.current_phase, ConversationPhase::Exploration);
        assert_eq!(loaded.total_exchange_count, 4);
        assert!(loaded.active_threads.is_empty());
    }

    #[tokio::test]
    async fn save_overwrites_previous_document() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStateStorage::new(temp_dir.path());
        let session = SessionId::new();
        let mut state = test_state();

        storage.save(session, &state).await.unwrap();
        state.record_exchange();
        storage.save(session, &state).await.unwrap();

        let loaded = storage.load(session).await.unwrap().unwrap();
        assert_eq!(loaded.total_exchange_count, 2);
        assert!(!storage.session_dir(session).join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn exists_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStateStorage::new(temp_dir.path());
        let session = SessionId::new();

        assert!(!storage.exists(session).await.unwrap());
        storage.save(session, &test_state()).await.unwrap();
        assert!(storage.exists(session).await.unwrap());

        storage.delete(session).await.unwrap();
        assert!(!storage.exists(session).await.unwrap());
        storage.delete(session).await.unwrap();
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStateStorage::new(temp_dir.path());
        let first = SessionId::new();
        let second = SessionId::new();

        storage.save(first, &test_state()).await.unwrap();
        storage.save(second, &ConversationState::new()).await.unwrap();

        assert_eq!(storage.load(first).await.unwrap().unwrap().active_threads.len(), 1);
        assert!(storage.load(second).await.unwrap().unwrap().active_threads.is_empty());
    }
}
