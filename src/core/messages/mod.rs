//! # Messages Module
//!
//! Parameterised, localisable text for the run log and status lines.
//!
//! Templates are looked up by key and may contain `{name}` placeholders.
//! English templates are built in; a locale file can override any of them.
//!
//! ## Locale files
//! `<locales_dir>/<language>.json` holding a flat object:
//! ```json
//! { "log.no_images": "Keine Bilder gefunden." }
//! ```

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Named arguments substituted into a template
pub type MessageArgs<'a> = &'a [(&'a str, &'a dyn Display)];

/// Source of display text for log and status keys
pub trait MessageCatalog: Send + Sync {
    /// Render `key` with `args`; unknown keys render as the key itself
    fn text(&self, key: &str, args: MessageArgs<'_>) -> String;
}

const ENGLISH: &[(&str, &str)] = &[
    ("status.estimating", "Estimating..."),
    ("status.done", "Done"),
    ("log.scanning_folder", "Scanning folder {folder}"),
    ("log.no_images", "No supported images found."),
    ("log.collected_candidates", "Collected {count} candidate files."),
    ("log.scan_entry_skipped", "Skipped unreadable entry {path}"),
    (
        "log.resuming_loading",
        "Resuming cache build at {index} of {total} (last file: {name}).",
    ),
    ("log.loading_cache", "Building image cache for {count} files."),
    (
        "log.loading_done",
        "Image cache ready: {count} images ({reused} reused from cache).",
    ),
    ("log.loading_interrupted", "Cache build interrupted after {count} files."),
    ("log.only_one_image", "Fewer than two images to compare."),
    ("log.resuming_state", "Resuming comparison at i={i}, j={j}."),
    ("log.starting_detection", "Starting duplicate detection."),
    ("log.base_status", "[{index}/{total}] Comparing {name}"),
    ("log.moved_sha", "Moved exact duplicate (SHA-1): {path}"),
    ("log.moved_ssim", "Moved similar image (SSIM {score}): {path}"),
    ("log.debug_ssim", "SSIM {score} between {pathA} and {pathB}"),
    ("log.duplicates_complete", "Duplicate detection complete."),
    ("log.moved_new_files", "Moved {count} new files."),
    (
        "log.detection_interrupted",
        "Duplicate detection interrupted; progress saved.",
    ),
    ("log.convert_heic", "Converted HEIC image to JPEG: {path}"),
    ("log.convert_heic_fail", "Could not convert {path}. {hint}"),
    (
        "hint.heic_install",
        "Install a HEIC codec (on macOS the built-in sips tool is used).",
    ),
    ("log.rename_jfif", "Renamed {path} to {newPath}"),
    ("log.rename_jfif_fail", "Could not rename {path}"),
    ("log.extension_fixed", "Fixed file extension: {path}"),
    ("log.extension_fail", "Could not fix the extension of {path}"),
    ("log.build_cache_fail", "Could not read image {path}"),
    ("log.moved_corrupt", "Moved unreadable file to duplicates: {path}"),
    ("log.move_failed", "Failed to move {source}"),
    ("log.name_conflict", "A file named {name} already exists in the destination."),
    (
        "log.sha_mismatch",
        "Files share a name but differ in content; both were kept.",
    ),
    ("log.removed_duplicate", "Removed duplicate copy {path}"),
    ("log.resolve_conflict_failed", "Could not resolve the name conflict."),
    (
        "log.image_cache_signature_mismatch",
        "Image cache has an unknown format and was discarded.",
    ),
    ("log.image_cache_load_failed", "Could not load image cache {path}"),
    (
        "log.image_cache_truncated",
        "Image cache ended in a partial record; kept {count} records.",
    ),
    ("log.cache_append_failed", "Could not append {path} to the image cache"),
    ("log.checkpoint_save_failed", "Could not save checkpoint {path}"),
];

/// Template-based catalog with an English fallback
pub struct Translator {
    templates: HashMap<String, String>,
}

impl Translator {
    /// Built-in English templates only
    pub fn english() -> Self {
        Self {
            templates: ENGLISH
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// English templates overlaid with `<locales_dir>/<language>.json` when it exists.
    ///
    /// An unreadable or malformed locale file leaves the English text in place.
    pub fn load(language: &str, locales_dir: Option<&Path>) -> Self {
        let mut translator = Self::english();
        let language = language.trim().to_lowercase();
        let language = if language.is_empty() { "en".to_string() } else { language };

        if let Some(dir) = locales_dir {
            let path = dir.join(format!("{language}.json"));
            match fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                    Ok(overrides) => translator.templates.extend(overrides),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed locale file"),
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "No locale file, using English")
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable locale file"),
            }
        }

        translator
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::english()
    }
}

impl MessageCatalog for Translator {
    fn text(&self, key: &str, args: MessageArgs<'_>) -> String {
        let template = self.templates.get(key).map(String::as_str).unwrap_or(key);
        substitute(template, args)
    }
}

/// Replace `{name}` placeholders, matching names case-insensitively.
///
/// Placeholders without a matching argument are left as they are.
pub fn substitute(template: &str, args: MessageArgs<'_>) -> String {
    if args.is_empty() {
        return template.to_string();
    }

    placeholder_regex()
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            args.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"))
}
