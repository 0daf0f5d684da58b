//! # Mover Module
//!
//! Conflict-aware relocation of files into the `duplicates` folder.
//!
//! A move never overwrites an existing file. When the destination name is
//! taken, both files are hashed:
//! - same content: the older copy (or the source, on a tie) is deleted
//! - different content: nothing is touched and the move is refused

use crate::core::hasher::{content_digest, digests_match};
use crate::core::logging::RunLogger;
use crate::error::{HashError, MoveError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a successful move was completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The source now lives at the destination
    Moved,
    /// An identical, newer copy already existed; the source was deleted
    SourceRemoved,
    /// An identical, older copy existed; it was deleted and the source moved in its place
    DestinationReplaced,
}

/// Relocates files without ever overwriting different content
pub struct SafeFileMover {
    logger: Arc<RunLogger>,
}

impl SafeFileMover {
    pub fn new(logger: Arc<RunLogger>) -> Self {
        Self { logger }
    }

    /// Move `source` to `destination`, creating the destination folder.
    pub fn move_file(&self, source: &Path, destination: &Path) -> Result<MoveOutcome, MoveError> {
        let moved = destination
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| move_no_clobber(source, destination));

        match moved {
            Ok(()) => {
                tracing::debug!(from = %source.display(), to = %destination.display(), "Moved file");
                Ok(MoveOutcome::Moved)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                self.resolve_conflict(source, destination)
            }
            Err(e) => {
                let error = MoveError::Io {
                    path: source.to_path_buf(),
                    source: e,
                };
                self.logger
                    .error("log.move_failed", &[("source", &source.display())], Some(&error));
                Err(error)
            }
        }
    }

    /// Move a file the detector cannot use into `duplicates_dir`.
    ///
    /// When the name is taken by a different file, the first free
    /// `name (k).ext` is used instead. Returns where the file ended up;
    /// failures are logged and yield `None`.
    pub fn relocate_problem_file(&self, path: &Path, duplicates_dir: &Path) -> Option<PathBuf> {
        let relocated = self.relocate(path, duplicates_dir)?;
        self.logger
            .warn("log.moved_corrupt", &[("path", &path.display())]);
        Some(relocated)
    }

    /// Move `path` into `duplicates_dir` under its own name, or the first
    /// free numbered variant when that name holds different content.
    pub fn relocate(&self, path: &Path, duplicates_dir: &Path) -> Option<PathBuf> {
        let name = path.file_name()?;
        let destination = duplicates_dir.join(name);

        match self.move_file(path, &destination) {
            Ok(_) => Some(destination),
            Err(MoveError::Conflict { .. }) => {
                let alternative = free_name(duplicates_dir, path);
                self.move_file(path, &alternative).ok().map(|_| alternative)
            }
            Err(_) => None,
        }
    }

    fn resolve_conflict(&self, source: &Path, destination: &Path) -> Result<MoveOutcome, MoveError> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        self.logger.warn("log.name_conflict", &[("name", &name)]);

        let result = self.replace_identical(source, destination);
        match &result {
            Err(error @ MoveError::Io { .. }) => {
                self.logger
                    .error("log.resolve_conflict_failed", &[], Some(error));
            }
            Err(MoveError::Conflict { .. }) => self.logger.warn("log.sha_mismatch", &[]),
            Ok(_) => {}
        }
        result
    }

    fn replace_identical(&self, source: &Path, destination: &Path) -> Result<MoveOutcome, MoveError> {
        let source_digest = content_digest(source).map_err(into_move_error)?;
        let destination_digest = content_digest(destination).map_err(into_move_error)?;

        if !digests_match(&source_digest, &destination_digest) {
            return Err(MoveError::Conflict {
                source_path: source.to_path_buf(),
                destination: destination.to_path_buf(),
            });
        }

        let source_time = modified(source)?;
        let destination_time = modified(destination)?;

        if source_time <= destination_time {
            remove(source)?;
            self.logger
                .info("log.removed_duplicate", &[("path", &source.display())]);
            Ok(MoveOutcome::SourceRemoved)
        } else {
            remove(destination)?;
            move_no_clobber(source, destination).map_err(|e| MoveError::Io {
                path: source.to_path_buf(),
                source: e,
            })?;
            self.logger
                .info("log.removed_duplicate", &[("path", &destination.display())]);
            Ok(MoveOutcome::DestinationReplaced)
        }
    }
}

/// Move without replacing an existing destination.
///
/// Hard link plus unlink refuses an existing name atomically. File systems
/// without hard links fall back to rename, then to copy-verify-delete.
pub(crate) fn move_no_clobber(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::hard_link(source, destination) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(source) {
                let _ = fs::remove_file(destination);
                return Err(e);
            }
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(e),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(e),
        Err(_) => {
            if destination.symlink_metadata().is_ok() {
                return Err(io::Error::new(
                    ErrorKind::AlreadyExists,
                    format!("{} already exists", destination.display()),
                ));
            }
            fs::rename(source, destination).or_else(|_| copy_verify_delete(source, destination))
        }
    }
}

/// Copy into a freshly created destination, check the size, then delete the source
fn copy_verify_delete(source: &Path, destination: &Path) -> io::Result<()> {
    let source_size = fs::metadata(source)?.len();
    let mut reader = File::open(source)?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;

    let copied = io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    drop(writer);

    let dest_size = fs::metadata(destination)?.len();
    if copied != source_size || dest_size != source_size {
        let _ = fs::remove_file(destination);
        return Err(io::Error::new(
            ErrorKind::Other,
            format!(
                "Copy verification failed: source {} bytes, dest {} bytes",
                source_size, dest_size
            ),
        ));
    }

    fs::remove_file(source)
}

/// First `stem (k).ext` in `dir` that does not exist yet
fn free_name(dir: &Path, original: &Path) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u32..)
        .map(|k| dir.join(format!("{stem} ({k}){extension}")))
        .find(|candidate| candidate.symlink_metadata().is_err())
        .unwrap_or_else(|| dir.join(format!("{stem} (overflow){extension}")))
}

fn modified(path: &Path) -> Result<std::time::SystemTime, MoveError> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| MoveError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}

fn remove(path: &Path) -> Result<(), MoveError> {
    fs::remove_file(path).map_err(|e| MoveError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn into_move_error(error: HashError) -> MoveError {
    match error {
        HashError::IoError { path, source } => MoveError::Io { path, source },
        other => MoveError::Io {
            path: PathBuf::new(),
            source: io::Error::new(ErrorKind::Other, other.to_string()),
        },
    }
}
