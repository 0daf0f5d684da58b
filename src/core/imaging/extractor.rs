//! Feature extraction: one decode, two resampled buffers, two fingerprints.

use super::decode::GrayDecoder;
use super::record::{ImageRecord, SIMILARITY_SIZE};
use super::resize::FastResizer;
use crate::core::hasher::{content_digest, PerceptualHasher, PHASH_INPUT_SIZE};
use crate::error::HashError;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Builds [`ImageRecord`]s from image files
pub struct FeatureExtractor {
    decoder: Arc<dyn GrayDecoder>,
    hasher: PerceptualHasher,
    resizer: Mutex<FastResizer>,
}

impl FeatureExtractor {
    pub fn new(decoder: Arc<dyn GrayDecoder>) -> Self {
        Self {
            decoder,
            hasher: PerceptualHasher::new(),
            resizer: Mutex::new(FastResizer::new()),
        }
    }

    /// Decode `path` and compute every feature the comparison needs
    pub fn extract(&self, path: &Path) -> Result<ImageRecord, HashError> {
        let gray = self.decoder.decode_gray(path)?;
        let (width, height) = gray.dimensions();

        let (small, pixels) = {
            let mut resizer = match self.resizer.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let small = resizer
                .resize_square(&gray, PHASH_INPUT_SIZE as u32)
                .map_err(|e| with_path(e, path))?;
            let pixels = resizer
                .resize_square(&gray, SIMILARITY_SIZE)
                .map_err(|e| with_path(e, path))?;
            (small, pixels)
        };

        let phash = self.hasher.hash(&small)?;
        let digest = content_digest(path)?;
        let length = fs::metadata(path)
            .map_err(|e| HashError::IoError {
                path: path.to_path_buf(),
                source: e,
            })?
            .len();

        tracing::debug!(path = %path.display(), width, height, phash, "Extracted features");

        Ok(ImageRecord {
            path: path.to_path_buf(),
            width,
            height,
            length,
            phash,
            digest,
            pixels,
        })
    }
}

/// Resizer errors carry no path; attach the file being processed
fn with_path(error: HashError, path: &Path) -> HashError {
    match error {
        HashError::DecodeError { path: p, reason } if p.as_os_str().is_empty() => {
            HashError::DecodeError {
                path: path.to_path_buf(),
                reason,
            }
        }
        other => other,
    }
}
