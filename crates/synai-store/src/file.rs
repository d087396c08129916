use std::path::{Path, PathBuf};
use std::sync::Mutex;

use synai_types::RelayError;

use crate::snapshot::StoreSnapshot;

/// File-based snapshot store with atomic writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes writers so two checkpoints never race on the temp file.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("state.json"),
            write_lock: Mutex::new(()),
        }
    }

    /// Default state directory: `~/.synai/` or `$SYNAI_STATE_DIR`.
    pub fn default_state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("SYNAI_STATE_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".synai")
        }
    }

    /// Load state from disk. Returns an empty snapshot if the file doesn't exist.
    pub fn load(&self) -> Result<StoreSnapshot, RelayError> {
        if !self.path.exists() {
            return Ok(StoreSnapshot::default());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            RelayError::Storage(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content).map_err(|e| {
            RelayError::Storage(format!("failed to parse {}: {e}", self.path.display()))
        })?;
        tracing::debug!(
            path = %self.path.display(),
            jobs = snapshot.jobs.len(),
            agents = snapshot.agents.len(),
            ledger_entries = snapshot.ledger_entries.len(),
            "Loaded state snapshot"
        );
        Ok(snapshot)
    }

    /// Save state to disk using atomic write (.tmp → rename).
    pub fn save(&self, snapshot: &StoreSnapshot) -> Result<(), RelayError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RelayError::Storage("snapshot writer lock poisoned".into()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RelayError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&tmp_path, content).map_err(|e| {
            RelayError::Storage(format!("failed to write {}: {e}", tmp_path.display()))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            RelayError::Storage(format!("failed to rename {}: {e}", tmp_path.display()))
        })?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
