//! Phase 2: pairwise comparison of the sorted records and relocation of duplicates.

use super::cancellation::CancellationToken;
use super::progress::ProgressReporter;
use crate::core::checkpoint::{ResumeState, ResumeStore};
use crate::core::hasher::{digests_match, hamming_distance};
use crate::core::imaging::ImageRecord;
use crate::core::logging::RunLogger;
use crate::core::mover::SafeFileMover;
use crate::core::similarity::global_ssim;
use crate::events::{Event, EventSender, PipelinePhase, StatsSnapshot};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Instant;

/// Outcome of comparing one pair that matched
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub path_a: PathBuf,
    pub path_b: PathBuf,
    /// 1.0 for identical content, otherwise the SSIM score
    pub score: f64,
    /// Matched by content digest
    pub exact: bool,
}

/// Entries kept by [`HammingMemo`] before it stops growing
const MEMO_LIMIT: usize = 1 << 16;

/// Memoized Hamming distances keyed by the unordered pair of hashes.
///
/// Holds at most `limit` entries; once full, further distances are
/// computed directly.
#[derive(Debug)]
pub struct HammingMemo {
    distances: RwLock<HashMap<(u64, u64), u32>>,
    limit: usize,
}

impl HammingMemo {
    pub fn new() -> Self {
        Self::with_limit(MEMO_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            distances: RwLock::new(HashMap::new()),
            limit,
        }
    }

    pub fn distance(&self, a: u64, b: u64) -> u32 {
        let key = (a.min(b), a.max(b));

        if let Ok(distances) = self.distances.read() {
            if let Some(&distance) = distances.get(&key) {
                return distance;
            }
        }

        let distance = hamming_distance(a, b);
        if let Ok(mut distances) = self.distances.write() {
            if distances.len() < self.limit {
                distances.insert(key, distance);
            }
        }
        distance
    }

    pub fn len(&self) -> usize {
        self.distances.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HammingMemo {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides whether two records are duplicates
pub struct PairComparator<'a> {
    ssim_threshold: f64,
    phash_threshold: u32,
    debug_log_ssim: bool,
    memo: HammingMemo,
    logger: &'a RunLogger,
}

impl<'a> PairComparator<'a> {
    pub fn new(
        ssim_threshold: f64,
        phash_threshold: u32,
        debug_log_ssim: bool,
        logger: &'a RunLogger,
    ) -> Self {
        Self {
            ssim_threshold,
            phash_threshold,
            debug_log_ssim,
            memo: HammingMemo::new(),
            logger,
        }
    }

    /// `Some` when the pair is a duplicate.
    ///
    /// Content digests are checked first; SSIM only runs on pairs whose
    /// perceptual hashes are within the threshold.
    pub fn compare(&self, a: &ImageRecord, b: &ImageRecord) -> Option<ComparisonResult> {
        if digests_match(&a.digest, &b.digest) {
            return Some(ComparisonResult {
                path_a: a.path.clone(),
                path_b: b.path.clone(),
                score: 1.0,
                exact: true,
            });
        }

        if self.memo.distance(a.phash, b.phash) > self.phash_threshold {
            return None;
        }

        let score = match global_ssim(&a.pixels, &b.pixels) {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(a = %a.path.display(), b = %b.path.display(), error = %e, "Cannot score pair");
                return None;
            }
        };

        if self.debug_log_ssim {
            self.logger.debug(
                "log.debug_ssim",
                &[
                    ("score", &format!("{score:.4}")),
                    ("pathA", &a.path.display()),
                    ("pathB", &b.path.display()),
                ],
            );
        }

        (score >= self.ssim_threshold).then(|| ComparisonResult {
            path_a: a.path.clone(),
            path_b: b.path.clone(),
            score,
            exact: false,
        })
    }
}

/// The record to relocate from a duplicate pair: the lower resolution, `a` on a tie
pub fn choose_smaller<'r>(a: &'r ImageRecord, b: &'r ImageRecord) -> &'r ImageRecord {
    if a.resolution() <= b.resolution() {
        a
    } else {
        b
    }
}

/// Number of pairs `(x, y)`, `x < y < n`, visited before `(i, j)`
pub fn pairs_before(n: usize, i: usize, j: usize) -> usize {
    let full_rows: usize = (0..i).map(|row| n - 1 - row).sum();
    full_rows + j.saturating_sub(i + 1)
}

/// Result of the comparison loop
#[derive(Debug)]
pub enum CompareOutcome {
    Completed {
        pairs_compared: usize,
        moved_this_run: usize,
        moved_total: usize,
    },
    Cancelled,
}

/// Runs the comparison loop with checkpointing
pub struct ComparisonPass<'a> {
    pub comparator: PairComparator<'a>,
    pub resume_store: &'a ResumeStore,
    pub mover: &'a SafeFileMover,
    pub logger: &'a RunLogger,
    pub events: &'a EventSender,
    pub folder: &'a Path,
    pub duplicates_dir: &'a Path,
    pub checkpoint_interval: usize,
    pub started: Instant,
}

impl ComparisonPass<'_> {
    /// Compare every pair of `records`, starting from the cursor in `state`.
    ///
    /// `state` must hold a valid cursor for `records.len()`; on return it
    /// reflects where the loop stopped.
    pub fn run(
        &self,
        records: &[ImageRecord],
        state: &mut ResumeState,
        token: &CancellationToken,
        progress: &mut ProgressReporter,
    ) -> CompareOutcome {
        let n = records.len();
        let start_i = state.i;
        let start_j = state.j;
        let moved_before = state.moved.len();

        let mut compared = pairs_before(n, start_i, start_j);
        let mut since_save = 0;
        progress.start_phase(PipelinePhase::Comparing, n * (n - 1) / 2, compared);

        for i in start_i..n - 1 {
            let j_start = if i == start_i { start_j } else { i + 1 };
            self.enter_base(records, i, j_start, compared, state);

            for j in j_start..n {
                if token.is_cancelled() {
                    self.save(state, i, j, compared);
                    return CompareOutcome::Cancelled;
                }

                if since_save >= self.checkpoint_interval {
                    self.save(state, i, j, compared);
                    progress.refresh_eta();
                    since_save = 0;
                }

                let matched = self.comparator.compare(&records[i], &records[j]);
                compared += 1;
                since_save += 1;
                progress.report(compared);

                let Some(result) = matched else {
                    continue;
                };
                if state.moved.contains(&result.path_a) || state.moved.contains(&result.path_b) {
                    continue;
                }

                let loser = choose_smaller(&records[i], &records[j]);
                if self.relocate(loser, &result) {
                    state.moved.insert(loser.path.clone());
                    // Pair (i, j) is recompared on resume and skipped via `moved`
                    self.save(state, i, j, compared - 1);
                    self.emit_stats(n, i + 1, state.moved.len());
                }
            }
        }

        state.i = n - 1;
        state.j = n;
        state.current_progress = compared;
        CompareOutcome::Completed {
            pairs_compared: compared,
            moved_this_run: state.moved.len() - moved_before,
            moved_total: state.moved.len(),
        }
    }

    fn enter_base(
        &self,
        records: &[ImageRecord],
        i: usize,
        j_start: usize,
        compared: usize,
        state: &mut ResumeState,
    ) {
        self.save(state, i, j_start, compared);

        let path = &records[i].path;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.logger.info(
            "log.base_status",
            &[("index", &(i + 1)), ("total", &records.len()), ("name", &name)],
        );
        self.emit_stats(records.len(), i, state.moved.len());
    }

    fn relocate(&self, record: &ImageRecord, result: &ComparisonResult) -> bool {
        let Some(name) = record.path.file_name() else {
            return false;
        };
        let destination = self.duplicates_dir.join(name);

        if self.mover.move_file(&record.path, &destination).is_err() {
            return false;
        }

        if result.exact {
            self.logger
                .info("log.moved_sha", &[("path", &record.path.display())]);
        } else {
            self.logger.info(
                "log.moved_ssim",
                &[
                    ("score", &format!("{:.4}", result.score)),
                    ("path", &record.path.display()),
                ],
            );
        }
        true
    }

    fn save(&self, state: &mut ResumeState, i: usize, j: usize, compared: usize) {
        state.i = i;
        state.j = j;
        state.current_progress = compared;

        if let Err(e) = self.resume_store.save(self.folder, state) {
            self.logger.warn_with(
                "log.checkpoint_save_failed",
                &[("path", &self.resume_store.path(self.folder).display())],
                &e,
            );
        }
    }

    fn emit_stats(&self, total_sources: usize, processed_base: usize, moved: usize) {
        self.events.send(Event::Stats(StatsSnapshot {
            total_sources,
            processed_base,
            moved,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }));
    }
}
