//! In-memory view of the cache file.

use crate::core::imaging::ImageRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Records replayed from the cache log, keyed by path; later records win
#[derive(Debug, Default, Clone)]
pub struct CacheSnapshot {
    records: HashMap<PathBuf, ImageRecord>,
}

impl CacheSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&ImageRecord> {
        self.records.get(path)
    }

    /// Add or replace the record for its path
    pub fn insert(&mut self, record: ImageRecord) {
        self.records.insert(record.path.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
