//! Phase 1: turn the normalized file list into records, reusing the cache.

use super::cancellation::CancellationToken;
use super::progress::ProgressReporter;
use crate::core::cache::{CacheSnapshot, ImageCacheStore};
use crate::core::checkpoint::LoadingCheckpoint;
use crate::core::imaging::{FeatureExtractor, ImageRecord};
use crate::core::logging::RunLogger;
use crate::core::mover::SafeFileMover;
use crate::events::PipelinePhase;
use std::path::{Path, PathBuf};

/// Files between two ETA refreshes
const ETA_INTERVAL: usize = 10;

/// Result of the cache build
#[derive(Debug)]
pub enum LoadOutcome {
    /// Every path was processed
    Completed {
        records: Vec<ImageRecord>,
        /// Records taken from the cache instead of being extracted
        reused: usize,
        /// Files that could not be decoded and were relocated
        failed: usize,
    },
    /// Cancellation was observed before `paths[completed]`
    Cancelled {
        completed: usize,
        last_path: Option<PathBuf>,
    },
}

/// Where to restart the cache build for `paths`.
///
/// An exact match of the checkpoint's path wins over its raw index, since
/// files may have been added or removed since the checkpoint was written.
pub fn resume_index(paths: &[PathBuf], checkpoint: Option<&LoadingCheckpoint>) -> usize {
    let Some(checkpoint) = checkpoint else {
        return 0;
    };
    if checkpoint.index == 0 || paths.is_empty() {
        return 0;
    }

    let index = checkpoint
        .path
        .as_ref()
        .and_then(|last| paths.iter().position(|p| p == last))
        .map(|position| position + 1)
        .unwrap_or(checkpoint.index);

    index.min(paths.len())
}

/// Builds the record list for one run
pub struct CacheLoader<'a> {
    pub extractor: &'a FeatureExtractor,
    pub store: &'a ImageCacheStore,
    pub mover: &'a SafeFileMover,
    pub logger: &'a RunLogger,
    pub folder: &'a Path,
    pub duplicates_dir: &'a Path,
}

impl CacheLoader<'_> {
    pub fn load(
        &self,
        paths: &[PathBuf],
        snapshot: &CacheSnapshot,
        start_index: usize,
        token: &CancellationToken,
        progress: &mut ProgressReporter,
    ) -> LoadOutcome {
        let mut records = Vec::with_capacity(paths.len());
        let mut reused = 0;
        let mut failed = 0;

        // Everything before the checkpoint was handled by the interrupted run
        let mut resume_at = start_index.min(paths.len());
        for (i, path) in paths[..resume_at].iter().enumerate() {
            match snapshot.get(path) {
                Some(record) if path.exists() => {
                    records.push(record.clone());
                    reused += 1;
                }
                _ => {
                    resume_at = i;
                    break;
                }
            }
        }

        let mut processed = resume_at;
        let mut last_path = resume_at.checked_sub(1).map(|i| paths[i].clone());

        progress.start_phase(PipelinePhase::BuildingCache, paths.len(), processed);

        for path in &paths[resume_at..] {
            if token.is_cancelled() {
                return LoadOutcome::Cancelled {
                    completed: processed,
                    last_path,
                };
            }

            processed += 1;
            last_path = Some(path.clone());

            match snapshot.get(path) {
                Some(record) if path.exists() => {
                    records.push(record.clone());
                    reused += 1;
                }
                _ => match self.extractor.extract(path) {
                    Ok(record) => {
                        if let Err(e) = self.store.append(self.folder, &record) {
                            self.logger.warn_with(
                                "log.cache_append_failed",
                                &[("path", &path.display())],
                                &e,
                            );
                        }
                        records.push(record);
                    }
                    Err(e) => {
                        self.logger
                            .error("log.build_cache_fail", &[("path", &path.display())], Some(&e));
                        self.mover.relocate_problem_file(path, self.duplicates_dir);
                        failed += 1;
                    }
                },
            }

            progress.report(processed);
            if processed % ETA_INTERVAL == 0 {
                progress.refresh_eta();
            }
        }

        tracing::debug!(records = records.len(), reused, failed, "Cache build finished");
        LoadOutcome::Completed {
            records,
            reused,
            failed,
        }
    }
}
