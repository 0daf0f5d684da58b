//! # Cache Module
//!
//! Persists extracted features so an interrupted or repeated run does not
//! decode every image again.
//!
//! ## Format
//! One append-only binary file per target folder (`.imagecache.bin`).
//! Each record is appended and flushed as soon as it is extracted, so a
//! crash loses at most the record being written. On load the log is
//! replayed into a [`CacheSnapshot`]; a partial trailing record is cut off.
//!
//! Records are reused by path only. Replacing a file in place with
//! different content keeps the old features until the cache is removed,
//! which happens when a run completes.

mod codec;
mod snapshot;
mod store;

pub use codec::{CACHE_MAGIC, CACHE_VERSION};
pub use snapshot::CacheSnapshot;
pub use store::{ImageCacheStore, CACHE_FILE_NAME};
