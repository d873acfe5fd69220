//! Write-once storage for generated workbooks.
//!
//! Artifacts are named `forecast_<32 hex>.xlsx` from a random UUID. Lookups
//! accept only names of that exact shape, so a request can never address a
//! path outside the store directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::AppError;

const PREFIX: &str = "forecast_";
const SUFFIX: &str = ".xlsx";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::new(4, format!("Failed to create files dir '{}': {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store a workbook under a fresh name and return that name.
    pub fn save(&self, bytes: &[u8]) -> Result<String, AppError> {
        let name = self.save_with(|file| file.write_all(bytes))?;
        tracing::info!(artifact = %name, bytes = bytes.len(), "workbook stored");
        Ok(name)
    }

    /// A failed write removes the partial file, so it is never served.
    fn save_with(&self, write: impl FnOnce(&mut File) -> io::Result<()>) -> Result<String, AppError> {
        let name = format!("{PREFIX}{}{SUFFIX}", Uuid::new_v4().simple());
        let path = self.dir.join(&name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| AppError::new(4, format!("Failed to create '{}': {e}", path.display())))?;
        if let Err(e) = write(&mut file).and_then(|()| file.sync_all()) {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove partial artifact");
            }
            return Err(AppError::new(4, format!("Failed to write '{}': {e}", path.display())));
        }
        Ok(name)
    }

    /// Path of a stored artifact, or `None` when `name` is not an artifact name.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        is_artifact_name(name).then(|| self.dir.join(name))
    }
}

pub fn is_artifact_name(name: &str) -> bool {
    let Some(id) = name.strip_prefix(PREFIX).and_then(|rest| rest.strip_suffix(SUFFIX)) else {
        return false;
    };
    id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit())
}
