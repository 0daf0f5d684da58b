//! # Core Module
//!
//! The presentation-agnostic duplicate detection engine.
//!
//! ## Modules
//! - `scanner` - Discovers candidate images in a folder tree
//! - `imaging` - Normalizes files and extracts per-image features
//! - `hasher` - Perceptual hash and content digest
//! - `similarity` - Global SSIM score
//! - `cache` - Append-only feature cache
//! - `checkpoint` - Resume documents for interrupted runs
//! - `mover` - Conflict-aware relocation into `duplicates/`
//! - `messages` / `logging` - Localised run log
//! - `pipeline` - Orchestrates the full workflow

pub mod cache;
pub mod checkpoint;
pub mod hasher;
pub mod imaging;
pub mod logging;
pub mod messages;
pub mod mover;
pub mod pipeline;
pub mod scanner;
pub mod similarity;

// Re-export commonly used types
pub use imaging::ImageRecord;
pub use pipeline::{CancellationToken, DetectorBuilder, DetectorConfig, DuplicateDetector, RunOutcome};
