//! # Image Deduper
//!
//! Finds and relocates duplicate images inside a folder tree.
//!
//! ## Core Philosophy
//! - **Never lose a photo** - duplicates are moved aside into `duplicates/`, never deleted,
//!   unless a byte-identical copy is kept
//! - **Resumable** - both the feature-extraction and the comparison phase checkpoint their
//!   progress and pick up where a cancelled or crashed run stopped
//! - **Exact and visual** - byte-identical copies and re-encodes at other resolutions are both caught
//!
//! ## Architecture
//! The library is split into a core engine (GUI-agnostic) and presentation layers:
//! - `core` - The detection-and-dedup engine
//! - `events` - Event-driven progress reporting (GUI-ready)
//! - `error` - User-friendly error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{DedupError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("A global tracing subscriber was already installed");
    }
}
