//! # Pipeline Module
//!
//! Orchestrates a duplicate detection run on one folder.
//!
//! ## Phases
//! 1. **Scan** - enumerate supported images, skipping `duplicates/`
//! 2. **Normalize** - convert HEIC, fix extensions
//! 3. **Build cache** - extract features, reusing the on-disk cache
//! 4. **Sort** - order records by perceptual hash
//! 5. **Compare** - score every pair, move the lower-resolution copy of each duplicate
//! 6. **Finalize** - remove the cache and checkpoints
//!
//! ## Resuming
//! Cancellation is cooperative ([`CancellationToken`]). A run cancelled while
//! building the cache writes a loading checkpoint; one cancelled while
//! comparing writes the comparison cursor and the set of moved files. Running
//! again on the same folder continues from there.
//!
//! Work runs on the calling thread; events are the only output while it runs.

mod cancellation;
mod compare;
mod executor;
mod loading;
mod progress;

pub use cancellation::CancellationToken;
pub use compare::{choose_smaller, ComparisonResult, HammingMemo, PairComparator};
pub use executor::{DetectorBuilder, DetectorConfig, DuplicateDetector, RunOutcome};
pub use loading::{resume_index, LoadOutcome};
pub use progress::ProgressReporter;
