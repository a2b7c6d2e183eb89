//! Run state persistence
//!
//! Saves and loads run state to and from storage. The file store keeps one
//! JSON document per instance and replaces it atomically on every save.

use super::checkpoint;
use super::{HistoryStore, RunState, RunSummary, StateError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// One `<instance_id>.json` file per instance under a directory
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    /// Create a store rooted at `dir`, creating it if needed
    pub async fn new(dir: PathBuf) -> Result<Self, StateError> {
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StateError::PersistenceError(format!("{dir:?}: {e}")))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, instance_id: &str) -> Result<PathBuf, StateError> {
        if instance_id.is_empty()
            || !instance_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StateError::LoadError(format!(
                "invalid instance id '{instance_id}'"
            )));
        }
        Ok(self.dir.join(format!("{instance_id}.json")))
    }

    async fn read_state(path: &Path) -> Result<RunState, StateError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StateError::LoadError(format!("{path:?}: {e}")))?;
        let state: RunState = serde_json::from_str(&content)
            .map_err(|e| StateError::LoadError(format!("{path:?}: {e}")))?;
        checkpoint::verify(&state);
        Ok(state)
    }
}

#[async_trait::async_trait]
impl HistoryStore for FileHistoryStore {
    async fn save(&self, state: &RunState) -> Result<(), StateError> {
        let path = self.path_for(&state.instance_id)?;
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| StateError::PersistenceError(e.to_string()))?;

        let temp = self.dir.join(format!(".{}.json.tmp", state.instance_id));
        fs::write(&temp, content)
            .await
            .map_err(|e| StateError::PersistenceError(format!("{temp:?}: {e}")))?;
        fs::rename(&temp, &path)
            .await
            .map_err(|e| StateError::PersistenceError(format!("{path:?}: {e}")))?;

        debug!(
            "Saved state v{} for instance {}",
            state.version, state.instance_id
        );
        Ok(())
    }

    async fn load(&self, instance_id: &str) -> Result<Option<RunState>, StateError> {
        let path = self.path_for(instance_id)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            debug!("No state found for instance {}", instance_id);
            return Ok(None);
        }
        Self::read_state(&path).await.map(Some)
    }

    async fn list(&self) -> Result<Vec<RunSummary>, StateError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StateError::LoadError(e.to_string()))?;

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StateError::LoadError(e.to_string()))?
        {
            let path = entry.path();
            let is_state = path.extension().and_then(|e| e.to_str()) == Some("json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_state {
                continue;
            }
            match Self::read_state(&path).await {
                Ok(state) => summaries.push(state.summary()),
                Err(e) => warn!("Skipping unreadable state file {:?}: {}", path, e),
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}

/// In-memory state store for testing
#[derive(Default)]
pub struct InMemoryHistoryStore {
    states: RwLock<HashMap<String, RunState>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn save(&self, state: &RunState) -> Result<(), StateError> {
        self.states
            .write()
            .await
            .insert(state.instance_id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, instance_id: &str) -> Result<Option<RunState>, StateError> {
        Ok(self.states.read().await.get(instance_id).cloned())
    }

    async fn list(&self) -> Result<Vec<RunSummary>, StateError> {
        let mut summaries: Vec<_> = self
            .states
            .read()
            .await
            .values()
            .map(RunState::summary)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}
