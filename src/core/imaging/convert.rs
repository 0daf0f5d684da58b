//! Conversion of formats the decoders cannot read (HEIC/HEIF) to JPEG.

use crate::error::HashError;
use std::path::Path;

/// JPEG quality used for converted images
pub const CONVERSION_QUALITY: u8 = 95;

/// Converts an image file to a JPEG file
pub trait FormatConverter: Send + Sync {
    /// Write `source` as a JPEG at `destination`
    fn convert_to_jpeg(&self, source: &Path, destination: &Path, quality: u8)
        -> Result<(), HashError>;
}

/// Default converter using the macOS `sips` tool.
///
/// On other platforms every conversion fails with a codec-unavailable error.
#[derive(Debug, Default, Clone, Copy)]
pub struct SipsConverter;

impl FormatConverter for SipsConverter {
    #[cfg(target_os = "macos")]
    fn convert_to_jpeg(
        &self,
        source: &Path,
        destination: &Path,
        quality: u8,
    ) -> Result<(), HashError> {
        use std::process::Command;

        let output = Command::new("sips")
            .arg("-s")
            .arg("format")
            .arg("jpeg")
            .arg("-s")
            .arg("formatOptions")
            .arg(quality.to_string())
            .arg(source)
            .arg("--out")
            .arg(destination)
            .output()
            .map_err(|e| HashError::ConversionFailed {
                path: source.to_path_buf(),
                reason: format!("Failed to run sips: {}", e),
            })?;

        if !output.status.success() {
            let _ = std::fs::remove_file(destination);
            return Err(HashError::ConversionFailed {
                path: source.to_path_buf(),
                reason: format!(
                    "sips conversion failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    fn convert_to_jpeg(
        &self,
        source: &Path,
        _destination: &Path,
        _quality: u8,
    ) -> Result<(), HashError> {
        Err(HashError::ConversionFailed {
            path: source.to_path_buf(),
            reason: "HEIC codec is not available on this system".to_string(),
        })
    }
}
