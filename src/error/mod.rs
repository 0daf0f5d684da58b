//! # Error Module
//!
//! Error types for the image deduper.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Recover locally** - only a missing target folder stops a run;
//!   everything else is logged and the run moves on to the next file or pair

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Move error: {0}")]
    Move(#[from] MoveError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while enumerating the target folder
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// The directory or entry the error is about
    pub fn path(&self) -> &Path {
        match self {
            ScanError::DirectoryNotFound { path }
            | ScanError::PermissionDenied { path }
            | ScanError::ReadDirectory { path, .. } => path,
        }
    }
}

/// Errors that occur while decoding, converting or fingerprinting an image
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to decode image {path}: {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Image is empty or corrupted: {path}")]
    EmptyImage { path: PathBuf },

    #[error("Cannot convert {path}: {reason}")]
    ConversionFailed { path: PathBuf, reason: String },

    #[error("Expected a buffer of {expected} pixels, got {actual}")]
    InvalidBufferLength { expected: usize, actual: usize },

    #[error("Pixel buffers differ in length ({left} vs {right})")]
    BufferLengthMismatch { left: usize, right: usize },

    #[error("Failed to read image file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur with the binary image cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache file {path} has an unknown signature or version")]
    BadHeader { path: PathBuf },

    #[error("Cache record in {path} is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while saving or deleting checkpoint documents
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to serialize checkpoint {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Checkpoint I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur when relocating a file
#[derive(Error, Debug)]
pub enum MoveError {
    #[error("{destination} already exists with different content than {source_path}")]
    Conflict {
        source_path: PathBuf,
        destination: PathBuf,
    },

    #[error("Failed to move {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, DedupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_includes_path() {
        let error = ScanError::DirectoryNotFound {
            path: PathBuf::from("/photos/vacation"),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/vacation"));
    }

    #[test]
    fn hash_error_includes_path() {
        let error = HashError::DecodeError {
            path: PathBuf::from("/photos/broken.jpg"),
            reason: "invalid JPEG".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/broken.jpg"));
        assert!(message.contains("invalid JPEG"));
    }

    #[test]
    fn move_conflict_names_both_files() {
        let error = MoveError::Conflict {
            source_path: PathBuf::from("/photos/a.jpg"),
            destination: PathBuf::from("/photos/duplicates/a.jpg"),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/a.jpg"));
        assert!(message.contains("/photos/duplicates/a.jpg"));
    }

    #[test]
    fn top_level_error_wraps_sources() {
        let error: DedupError = ScanError::DirectoryNotFound {
            path: PathBuf::from("/missing"),
        }
        .into();
        assert!(error.to_string().starts_with("Scanning error"));
    }
}
