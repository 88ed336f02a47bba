//! Canonical save file.

use super::SaveStore;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use worldline_core::{
    GraphDocument, WorldSnapshot, WorldlineError, export_canonical, import_canonical,
};

/// Maximum save file size (500 MB).
pub const MAX_SAVE_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Saves the graph as one canonical export file.
///
/// Loads accept the canonical format first and JSON second, so a
/// hand-edited `worldline export --format json` file can be used as a save.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl SaveStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self) -> Result<Option<GraphDocument<WorldSnapshot>>, WorldlineError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let metadata = std::fs::metadata(&self.path)
            .map_err(|e| WorldlineError::IoError(format!("Cannot read file metadata: {}", e)))?;
        if metadata.len() > MAX_SAVE_FILE_SIZE {
            return Err(WorldlineError::SerializationError(format!(
                "File size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_SAVE_FILE_SIZE
            )));
        }

        let data = std::fs::read(&self.path)
            .map_err(|e| WorldlineError::IoError(format!("Read save: {}", e)))?;

        match import_canonical(&data) {
            Ok(document) => Ok(Some(document)),
            // Not JSON either: report why the canonical decode failed.
            Err(canonical_err) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|_| canonical_err),
        }
    }

    fn save(&self, document: &GraphDocument<WorldSnapshot>) -> Result<(), WorldlineError> {
        let data = export_canonical(document)?;
        let temp = self.temp_path();

        std::fs::write(&temp, &data)
            .map_err(|e| WorldlineError::IoError(format!("Write save: {}", e)))?;
        std::fs::rename(&temp, &self.path)
            .map_err(|e| WorldlineError::IoError(format!("Replace save: {}", e)))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), WorldlineError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WorldlineError::IoError(format!("Remove save: {}", e))),
        }
    }
}
