//! Content-based format detection.

use crate::error::HashError;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes read from the start of a file; enough for every magic number the image crate knows
const SNIFF_LEN: u64 = 64;

/// Detects an image format from file content
pub trait FormatSniffer: Send + Sync {
    /// File extensions of the detected format, canonical first.
    ///
    /// `Ok(None)` means the content was not recognised.
    fn sniff(&self, path: &Path) -> Result<Option<&'static [&'static str]>, HashError>;
}

/// Default sniffer backed by the image crate's magic-number table
#[derive(Debug, Default, Clone, Copy)]
pub struct MagicSniffer;

impl FormatSniffer for MagicSniffer {
    fn sniff(&self, path: &Path) -> Result<Option<&'static [&'static str]>, HashError> {
        let io_error = |source| HashError::IoError {
            path: path.to_path_buf(),
            source,
        };

        let mut header = Vec::with_capacity(SNIFF_LEN as usize);
        File::open(path)
            .map_err(io_error)?
            .take(SNIFF_LEN)
            .read_to_end(&mut header)
            .map_err(io_error)?;

        Ok(image::guess_format(&header)
            .ok()
            .map(|format| format.extensions_str())
            .filter(|extensions| !extensions.is_empty()))
    }
}
