//! # Checkpoint Module
//!
//! JSON documents that let an interrupted run pick up where it stopped.
//!
//! - [`LoadingCheckpoint`]: how far the cache build got
//! - [`ResumeState`]: the comparison cursor and the files already moved
//!
//! Both live in the target folder and are removed when their phase completes.
//! Saves are atomic: the document is written to a temporary file in the
//! same folder and renamed over the previous one.

use crate::error::CheckpointError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Default file name of the loading checkpoint
pub const LOADING_CHECKPOINT_FILE_NAME: &str = ".loading.json";

/// Default file name of the resume state
pub const RESUME_FILE_NAME: &str = "resume.json";

/// Progress of the cache build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingCheckpoint {
    /// Number of list entries completed
    pub index: usize,
    /// List length when the checkpoint was written
    pub total: usize,
    /// Last path attempted
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Position of the comparison loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeState {
    /// Base index
    pub i: usize,
    /// Candidate index
    pub j: usize,
    /// Source paths already relocated, in any earlier invocation
    #[serde(default)]
    pub moved: BTreeSet<PathBuf>,
    /// Pairs compared so far
    #[serde(default)]
    pub current_progress: usize,
}

impl ResumeState {
    /// Whether the cursor is usable for a list of `n` records
    pub fn cursor_is_valid(&self, n: usize) -> bool {
        n >= 2 && self.i < n - 1 && self.j > self.i && self.j < n
    }
}

/// A JSON document stored under a fixed name inside a folder
pub struct JsonStore<T> {
    file_name: String,
    _document: PhantomData<fn() -> T>,
}

/// Store for [`LoadingCheckpoint`]
pub type LoadingCheckpointStore = JsonStore<LoadingCheckpoint>;

/// Store for [`ResumeState`]
pub type ResumeStore = JsonStore<ResumeState>;

impl<T: Serialize + DeserializeOwned> JsonStore<T> {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            _document: PhantomData,
        }
    }

    /// Location of the document for `folder`
    pub fn path(&self, folder: &Path) -> PathBuf {
        folder.join(&self.file_name)
    }

    /// Write the document, replacing any previous one atomically
    pub fn save(&self, folder: &Path, document: &T) -> Result<(), CheckpointError> {
        let path = self.path(folder);
        let io_error = |source| CheckpointError::Io {
            path: path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(document).map_err(|source| {
            CheckpointError::Serialization {
                path: path.clone(),
                source,
            }
        })?;

        let mut temp = NamedTempFile::new_in(folder).map_err(io_error)?;
        temp.write_all(json.as_bytes()).map_err(io_error)?;
        temp.as_file().sync_all().map_err(io_error)?;
        temp.persist(&path).map_err(|e| io_error(e.error))?;

        tracing::debug!(path = %path.display(), "Saved checkpoint");
        Ok(())
    }

    /// Read the document; a missing, unreadable or malformed file yields `None`
    pub fn load(&self, folder: &Path) -> Option<T> {
        let path = self.path(folder);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read checkpoint");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed checkpoint");
                None
            }
        }
    }

    /// Remove the document if present
    pub fn delete(&self, folder: &Path) -> Result<(), CheckpointError> {
        let path = self.path(folder);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Io { path, source }),
        }
    }
}
