//! Directory walking implementation using walkdir.

use super::filter::{is_hidden, ImageFilter};
use super::{ImageScanner, ScanResult};
use crate::error::ScanError;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Configuration for the directory scanner
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Directory name skipped anywhere in the tree, compared case-insensitively
    pub excluded_dir_name: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            include_hidden: true,
            excluded_dir_name: Some("duplicates".to_string()),
        }
    }
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: ImageFilter,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let filter = ImageFilter::new().with_hidden(config.include_hidden);
        Self { config, filter }
    }

    /// Whether the walk should descend into `entry`
    fn should_enter(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }

        let excluded = match (&self.config.excluded_dir_name, entry.file_name().to_str()) {
            (Some(excluded), Some(name)) => name.eq_ignore_ascii_case(excluded),
            _ => false,
        };

        !excluded && (self.config.include_hidden || !is_hidden(entry.path()))
    }
}

impl ImageScanner for WalkDirScanner {
    fn scan(&self, root: &Path) -> Result<ScanResult, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut files = Vec::new();
        let mut errors = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.should_enter(entry));

        for entry_result in walker {
            match entry_result {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.filter.should_include(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();

                    let error = if e.io_error().map(|e| e.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path }
                    } else {
                        ScanError::ReadDirectory {
                            path,
                            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                        }
                    };

                    tracing::debug!(error = %error, "Skipping unreadable entry");
                    errors.push(error);
                }
            }
        }

        tracing::debug!(root = %root.display(), files = files.len(), "Scan complete");
        Ok(ScanResult { files, errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_photo(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        // Write minimal JPEG header
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        path
    }

    fn scan(root: &Path) -> ScanResult {
        WalkDirScanner::new(ScanConfig::default()).scan(root).unwrap()
    }

    #[test]
    fn scan_empty_directory_returns_empty_vec() {
        let temp_dir = TempDir::new().unwrap();

        let result = scan(temp_dir.path());

        assert!(result.files.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn scan_excludes_non_image_files() {
        let temp_dir = TempDir::new().unwrap();
        create_test_photo(temp_dir.path(), "photo.jpg");
        File::create(temp_dir.path().join("document.txt")).unwrap();
        File::create(temp_dir.path().join(".imagecache.bin")).unwrap();

        let result = scan(temp_dir.path());

        assert_eq!(result.files.len(), 1);
        assert!(result.files[0].ends_with("photo.jpg"));
    }

    #[test]
    fn scan_traverses_nested_directories_in_name_order() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("b_subdir");
        fs::create_dir(&subdir).unwrap();
        create_test_photo(temp_dir.path(), "c.jpg");
        create_test_photo(temp_dir.path(), "a.png");
        create_test_photo(&subdir, "nested.jpg");

        let result = scan(temp_dir.path());

        let names: Vec<_> = result
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "nested.jpg", "c.jpg"]);
    }

    #[test]
    fn scan_skips_duplicates_folder_at_any_depth() {
        let temp_dir = TempDir::new().unwrap();
        let top = temp_dir.path().join("Duplicates");
        let nested = temp_dir.path().join("album").join("duplicates");
        fs::create_dir_all(&top).unwrap();
        fs::create_dir_all(&nested).unwrap();
        create_test_photo(&top, "moved.jpg");
        create_test_photo(&nested, "moved_too.jpg");
        create_test_photo(temp_dir.path(), "kept.jpg");

        let result = scan(temp_dir.path());

        assert_eq!(result.files.len(), 1);
        assert!(result.files[0].ends_with("kept.jpg"));
    }

    #[test]
    fn scan_includes_hidden_files_by_default() {
        let temp_dir = TempDir::new().unwrap();
        create_test_photo(temp_dir.path(), "visible.jpg");
        create_test_photo(temp_dir.path(), ".hidden.jpg");

        assert_eq!(scan(temp_dir.path()).files.len(), 2);
    }

    #[test]
    fn scan_can_exclude_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let hidden = temp_dir.path().join(".thumbnails");
        fs::create_dir(&hidden).unwrap();
        create_test_photo(&hidden, "thumb.jpg");
        create_test_photo(temp_dir.path(), "visible.jpg");

        let config = ScanConfig {
            include_hidden: false,
            ..Default::default()
        };
        let result = WalkDirScanner::new(config).scan(temp_dir.path()).unwrap();

        assert_eq!(result.files.len(), 1);
    }

    #[test]
    fn scan_nonexistent_directory_returns_error() {
        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(Path::new("/nonexistent/path/12345"));

        assert!(matches!(result, Err(ScanError::DirectoryNotFound { .. })));
    }
}
