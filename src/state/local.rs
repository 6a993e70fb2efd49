//! Local file-based state storage backend.
//!
//! This module stores the state record as a JSON file, by default
//! `.fleetform/state.json`, for local development and single-machine use.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{FleetformError, Result, StateError};

use super::backend::StateBackend;
use super::types::StateRecord;

/// Local file-based state backend.
#[derive(Debug)]
pub struct LocalStateBackend {
    /// Base directory for state files.
    base_dir: PathBuf,
    /// Path to the state file.
    state_path: PathBuf,
}

impl LocalStateBackend {
    /// Creates a new local state backend from a custom state file path.
    #[must_use]
    pub fn with_state_path(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let base_dir = state_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        Self {
            base_dir,
            state_path,
        }
    }

    /// Returns the state file path.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Removes a stale `.backup` file left next to the state file.
    async fn cleanup_backup(&self) -> Result<()> {
        let backup_path = self.state_path.with_extension("backup");
        if fs::try_exists(&backup_path).await.unwrap_or(false) {
            debug!("Removing stale backup: {}", backup_path.display());
            fs::remove_file(&backup_path)
                .await
                .map_err(|e| persist_error("remove state backup", &e))?;
        }
        Ok(())
    }

    /// Replaces the state file with `bytes` through a synced sibling temp file.
    async fn write_atomically(&self, bytes: &[u8]) -> Result<()> {
        let staging = self.state_path.with_extension("tmp");

        let mut file = fs::File::create(&staging)
            .await
            .map_err(|e| persist_error("create staging file", &e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| persist_error("write staging file", &e))?;
        file.sync_all()
            .await
            .map_err(|e| persist_error("sync staging file", &e))?;
        drop(file);

        fs::rename(&staging, &self.state_path)
            .await
            .map_err(|e| persist_error("move staging file into place", &e))
    }
}

/// Wraps an I/O failure as a persistence error.
fn persist_error(action: &str, err: &std::io::Error) -> FleetformError {
    FleetformError::State(StateError::persistence(format!("Failed to {action}: {err}")))
}

/// Wraps an unreadable state file as corruption.
fn corrupted(err: impl std::fmt::Display) -> FleetformError {
    FleetformError::State(StateError::Corrupted {
        message: format!("State file is unreadable: {err}"),
    })
}

#[async_trait]
impl StateBackend for LocalStateBackend {
    async fn load(&self) -> Result<Option<StateRecord>> {
        let bytes = match fs::read(&self.state_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state at {}, starting empty", self.state_path.display());
                return Ok(None);
            }
            Err(e) => return Err(corrupted(e)),
        };

        let record: StateRecord = serde_json::from_slice(&bytes).map_err(corrupted)?;
        info!(
            "Loaded state version {} ({} resources) from {}",
            record.version,
            record.len(),
            self.state_path.display()
        );
        Ok(Some(record))
    }

    async fn save(&self, record: &StateRecord) -> Result<()> {
        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| persist_error("create state directory", &e))?;
        self.cleanup_backup().await?;

        let bytes = serde_json::to_vec_pretty(record).map_err(|e| {
            FleetformError::State(StateError::serialization(format!("Cannot encode state record: {e}")))
        })?;
        self.write_atomically(&bytes).await?;

        debug!("State version {} written to {}", record.version, self.state_path.display());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Attributes, ResourceId};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn backend_in_tempdir() -> (LocalStateBackend, TempDir) {
        let temp = TempDir::new().unwrap();
        let backend = LocalStateBackend::with_state_path(temp.path().join(".fleetform/state.json"));
        (backend, temp)
    }

    #[tokio::test]
    async fn test_record_survives_reopen() {
        let (backend, _temp) = backend_in_tempdir();

        let mut resources = BTreeMap::new();
        resources.insert(ResourceId::new("aws_instance", "web"), Attributes::new());
        let record = StateRecord::empty().successor(resources);
        backend.save(&record).await.unwrap();

        let reopened = LocalStateBackend::with_state_path(backend.state_path());
        assert_eq!(reopened.load().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_missing_file_is_no_state() {
        let (backend, _temp) = backend_in_tempdir();
        assert!(backend.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupted_file() {
        let (backend, _temp) = backend_in_tempdir();
        std::fs::create_dir_all(backend.state_path().parent().unwrap()).unwrap();
        std::fs::write(backend.state_path(), "{ not json").unwrap();

        let err = backend.load().await.unwrap_err();
        assert!(matches!(err, FleetformError::State(StateError::Corrupted { .. })));
    }

    #[tokio::test]
    async fn test_save_removes_stale_backup() {
        let (backend, _temp) = backend_in_tempdir();
        let backup = backend.state_path().with_extension("backup");
        std::fs::create_dir_all(backup.parent().unwrap()).unwrap();
        std::fs::write(&backup, "old").unwrap();

        backend.save(&StateRecord::empty()).await.unwrap();

        assert!(!backup.exists());
        assert!(backend.state_path().exists());
        assert!(!backend.state_path().with_extension("tmp").exists());
    }
}
