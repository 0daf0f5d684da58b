//! SIMD-accelerated square resampling.
//!
//! Uses the fast_image_resize crate, which picks AVX2/NEON when available.
//! Sources are centre-cropped to a square before resampling, so the
//! output fills the square instead of stretching the image.

use crate::error::HashError;
use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::GrayImage;
use std::path::PathBuf;

/// Reusable Lanczos3 resizer for grayscale images
pub struct FastResizer {
    resizer: Resizer,
}

impl FastResizer {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    /// Resample `gray` to a `size` x `size` buffer of values in 0..=255
    pub fn resize_square(&mut self, gray: &GrayImage, size: u32) -> Result<Vec<f32>, HashError> {
        let (src_width, src_height) = gray.dimensions();

        if src_width == 0 || src_height == 0 {
            return Err(HashError::DecodeError {
                path: PathBuf::new(),
                reason: "Invalid source dimensions".to_string(),
            });
        }

        if size == 0 {
            return Err(HashError::DecodeError {
                path: PathBuf::new(),
                reason: "Invalid destination dimensions".to_string(),
            });
        }

        let src_image =
            Image::from_vec_u8(src_width, src_height, gray.as_raw().clone(), PixelType::U8)
                .map_err(|e| HashError::DecodeError {
                    path: PathBuf::new(),
                    reason: format!("Failed to create source image: {}", e),
                })?;

        let mut dst_image = Image::new(size, size, PixelType::U8);

        let side = src_width.min(src_height);
        let left = f64::from(src_width - side) / 2.0;
        let top = f64::from(src_height - side) / 2.0;
        let options = ResizeOptions::new()
            .resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3))
            .crop(left, top, f64::from(side), f64::from(side));

        self.resizer
            .resize(&src_image, &mut dst_image, &options)
            .map_err(|e| HashError::DecodeError {
                path: PathBuf::new(),
                reason: format!("Resize failed: {}", e),
            })?;

        Ok(dst_image.into_vec().into_iter().map(f32::from).collect())
    }
}

impl Default for FastResizer {
    fn default() -> Self {
        Self::new()
    }
}
