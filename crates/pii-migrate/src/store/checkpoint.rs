//! [`FileCheckpointStore`]: migration progress persisted as a JSON file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fieldcrypt::migrate::{Checkpoint, CheckpointError, CheckpointStore};
use tracing::debug;

use super::write_atomic;

/// Checkpoint stored at a fixed path. A missing file means no checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Store the checkpoint at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&mut self) -> Result<Option<Checkpoint>, CheckpointError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| CheckpointError::Corrupt(e.to_string()))
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let bytes = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| CheckpointError::Corrupt(e.to_string()))?;
        write_atomic(&self.path, &bytes)?;
        debug!(path = %self.path.display(), "checkpoint saved");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
