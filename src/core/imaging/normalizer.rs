//! Pre-processing that brings every candidate into a decodable, correctly named form.
//!
//! 1. HEIC/HEIF files are converted to JPEG; the original is moved to `duplicates/`
//! 2. `.jfif` files are renamed to `.jpg`
//! 3. Extensions that disagree with the file content are corrected
//!
//! Steps 2 and 3 are best-effort: on failure the file keeps its current name.

use super::convert::{FormatConverter, CONVERSION_QUALITY};
use super::sniff::FormatSniffer;
use crate::core::logging::RunLogger;
use crate::core::mover::{move_no_clobber, SafeFileMover};
use crate::error::HashError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Renames and converts candidate files before feature extraction
pub struct ImageNormalizer {
    converter: Arc<dyn FormatConverter>,
    sniffer: Arc<dyn FormatSniffer>,
    mover: Arc<SafeFileMover>,
    logger: Arc<RunLogger>,
}

impl ImageNormalizer {
    pub fn new(
        converter: Arc<dyn FormatConverter>,
        sniffer: Arc<dyn FormatSniffer>,
        mover: Arc<SafeFileMover>,
        logger: Arc<RunLogger>,
    ) -> Self {
        Self {
            converter,
            sniffer,
            mover,
            logger,
        }
    }

    /// Normalize `path`, returning the path the file ends up at.
    ///
    /// `None` means the file is gone or could not be converted; the caller
    /// treats it as a problem file.
    pub fn normalize(&self, path: &Path, duplicates_dir: &Path) -> Option<PathBuf> {
        if !path.is_file() {
            return None;
        }

        let mut current = path.to_path_buf();

        if has_extension(&current, &["heic", "heif"]) {
            current = self.convert_heic(&current, duplicates_dir)?;
        }

        if has_extension(&current, &["jfif"]) {
            current = self.rename_jfif(&current);
        }

        Some(self.fix_extension(&current))
    }

    fn convert_heic(&self, path: &Path, duplicates_dir: &Path) -> Option<PathBuf> {
        let converted = path.with_extension("jpg");

        let result = if converted.exists() {
            Err(HashError::ConversionFailed {
                path: path.to_path_buf(),
                reason: format!("{} already exists", converted.display()),
            })
        } else {
            self.converter
                .convert_to_jpeg(path, &converted, CONVERSION_QUALITY)
        };

        if let Err(error) = result {
            let hint = self.logger.text("hint.heic_install", &[]);
            self.logger.error(
                "log.convert_heic_fail",
                &[("path", &path.display()), ("hint", &hint)],
                Some(&error),
            );
            return None;
        }

        // The original is superseded by the JPEG
        self.mover.relocate(path, duplicates_dir);
        self.logger
            .info("log.convert_heic", &[("path", &converted.display())]);
        Some(converted)
    }

    fn rename_jfif(&self, path: &Path) -> PathBuf {
        let renamed = path.with_extension("jpg");
        match move_no_clobber(path, &renamed) {
            Ok(()) => {
                self.logger.info(
                    "log.rename_jfif",
                    &[("path", &path.display()), ("newPath", &renamed.display())],
                );
                renamed
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => path.to_path_buf(),
            Err(e) => {
                self.logger
                    .error("log.rename_jfif_fail", &[("path", &path.display())], Some(&e));
                path.to_path_buf()
            }
        }
    }

    fn fix_extension(&self, path: &Path) -> PathBuf {
        let extensions = match self.sniffer.sniff(path) {
            Ok(Some(extensions)) => extensions,
            Ok(None) => return path.to_path_buf(),
            Err(e) => {
                self.logger
                    .warn_with("log.extension_fail", &[("path", &path.display())], &e);
                return path.to_path_buf();
            }
        };

        if has_extension(path, extensions) {
            return path.to_path_buf();
        }

        let Some(canonical) = extensions.first() else {
            return path.to_path_buf();
        };
        let fixed = path.with_extension(canonical);
        if fixed.exists() {
            return path.to_path_buf();
        }

        match move_no_clobber(path, &fixed) {
            Ok(()) => {
                self.logger
                    .info("log.extension_fixed", &[("path", &fixed.display())]);
                fixed
            }
            Err(e) => {
                self.logger
                    .warn_with("log.extension_fail", &[("path", &path.display())], &e);
                path.to_path_buf()
            }
        }
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}
