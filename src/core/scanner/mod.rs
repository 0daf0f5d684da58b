//! # Scanner Module
//!
//! Discovers candidate image files below a folder.
//!
//! ## Supported Formats
//! - JPEG (.jpg, .jpeg, .jfif)
//! - PNG (.png)
//! - WebP (.webp)
//! - HEIC (.heic, .heif) - converted to JPEG before comparison
//! - GIF (.gif)
//! - BMP (.bmp)
//! - TIFF (.tiff, .tif)
//!
//! The `duplicates` folder is never scanned, so relocated files do not
//! come back as candidates on the next run.
//!
//! ## Example
//! ```rust,ignore
//! use image_deduper::core::scanner::{ImageScanner, ScanConfig, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default());
//! let result = scanner.scan(Path::new("/Users/photos"))?;
//! ```

mod filter;
mod walker;

pub use filter::{ImageFilter, SUPPORTED_EXTENSIONS};
pub use walker::{ScanConfig, WalkDirScanner};

use crate::error::ScanError;
use std::path::{Path, PathBuf};

/// Result of a scan operation
#[derive(Debug)]
pub struct ScanResult {
    /// Supported files, in file-name order per directory
    pub files: Vec<PathBuf>,
    /// Entries that could not be read (non-fatal)
    pub errors: Vec<ScanError>,
}

/// Trait for image scanners
///
/// Implement this trait to create custom scanners (e.g., for testing).
pub trait ImageScanner: Send + Sync {
    /// Enumerate candidate files below `root`.
    ///
    /// Fails only when `root` is not an existing directory.
    fn scan(&self, root: &Path) -> Result<ScanResult, ScanError>;
}
