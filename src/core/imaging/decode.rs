//! Grayscale image decoding with format-specific fast paths.
//!
//! Uses zune-jpeg for JPEG files, decoding straight to luma,
//! and falls back to the image crate for everything else.

use crate::error::HashError;
use image::{GrayImage, ImageBuffer, ImageReader, Luma};
use std::fs;
use std::path::Path;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Decodes an image file into an 8-bit grayscale buffer
pub trait GrayDecoder: Send + Sync {
    fn decode_gray(&self, path: &Path) -> Result<GrayImage, HashError>;
}

/// Default decoder: zune-jpeg for JPEG, image crate for the rest
#[derive(Debug, Default, Clone, Copy)]
pub struct FastDecoder;

impl FastDecoder {
    fn is_jpeg(path: &Path) -> bool {
        matches!(
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .as_deref(),
            Some("jpg" | "jpeg" | "jfif")
        )
    }

    /// JPEG decoding using zune-jpeg, asking for luma output
    fn decode_jpeg(path: &Path) -> Result<GrayImage, HashError> {
        let file_bytes = fs::read(path).map_err(|e| HashError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::Luma);
        let mut decoder = JpegDecoder::new_with_options(&file_bytes, options);

        let pixels = decoder.decode().map_err(|e| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: format!("zune-jpeg decode failed: {:?}", e),
        })?;

        let info = decoder.info().ok_or_else(|| HashError::DecodeError {
            path: path.to_path_buf(),
            reason: "Failed to get image info".to_string(),
        })?;

        // Some colorspaces (CMYK, YCCK) cannot be converted to luma directly
        match decoder.get_output_colorspace() {
            Some(ColorSpace::Luma) => {}
            other => {
                return Err(HashError::DecodeError {
                    path: path.to_path_buf(),
                    reason: format!("unexpected output colorspace {:?}", other),
                })
            }
        }

        let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_raw(info.width as u32, info.height as u32, pixels)
                .ok_or_else(|| HashError::DecodeError {
                    path: path.to_path_buf(),
                    reason: "Failed to create Luma buffer".to_string(),
                })?;

        Ok(buffer)
    }

    /// image crate decoding with the format guessed from the content
    fn decode_fallback(path: &Path) -> Result<GrayImage, HashError> {
        let decode_error = |reason: String| HashError::DecodeError {
            path: path.to_path_buf(),
            reason,
        };

        let image = ImageReader::open(path)
            .map_err(|e| HashError::IoError {
                path: path.to_path_buf(),
                source: e,
            })?
            .with_guessed_format()
            .map_err(|e| decode_error(e.to_string()))?
            .decode()
            .map_err(|e| decode_error(e.to_string()))?;

        Ok(image.to_luma8())
    }
}

impl GrayDecoder for FastDecoder {
    fn decode_gray(&self, path: &Path) -> Result<GrayImage, HashError> {
        let image = if Self::is_jpeg(path) {
            Self::decode_jpeg(path).or_else(|e| {
                tracing::debug!(path = %path.display(), error = %e, "Fast JPEG path failed, falling back");
                Self::decode_fallback(path)
            })?
        } else {
            Self::decode_fallback(path)?
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(HashError::EmptyImage {
                path: path.to_path_buf(),
            });
        }

        Ok(image)
    }
}
