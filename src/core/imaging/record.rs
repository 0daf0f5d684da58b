//! The per-image feature set.

use std::path::PathBuf;

/// Side length of the similarity buffer
pub const SIMILARITY_SIZE: u32 = 224;

/// Features extracted from one image file.
///
/// Records are keyed by their normalized path and never change once built.
/// A cached record is reused by path alone, so a file replaced in place
/// with different bytes keeps its old features until the cache is cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Absolute, normalized path
    pub path: PathBuf,
    /// Pixel width of the decoded image
    pub width: u32,
    /// Pixel height of the decoded image
    pub height: u32,
    /// File size in bytes
    pub length: u64,
    /// 64-bit DCT perceptual hash
    pub phash: u64,
    /// SHA-1 of the file bytes, lowercase hex
    pub digest: String,
    /// 224x224 grayscale buffer, row-major, values in 0..=255
    pub pixels: Vec<f32>,
}

impl ImageRecord {
    /// Pixel count, used to keep the better copy of a duplicate pair
    pub fn resolution(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}
