//! Duplicate detector execution.

use super::cancellation::CancellationToken;
use super::compare::{CompareOutcome, ComparisonPass, PairComparator};
use super::loading::{resume_index, CacheLoader, LoadOutcome};
use super::progress::ProgressReporter;
use crate::core::cache::{ImageCacheStore, CACHE_FILE_NAME};
use crate::core::checkpoint::{
    LoadingCheckpoint, LoadingCheckpointStore, ResumeState, ResumeStore,
    LOADING_CHECKPOINT_FILE_NAME, RESUME_FILE_NAME,
};
use crate::core::imaging::{
    FastDecoder, FeatureExtractor, FormatConverter, FormatSniffer, GrayDecoder, ImageNormalizer,
    ImageRecord, MagicSniffer, SipsConverter,
};
use crate::core::logging::RunLogger;
use crate::core::messages::{MessageCatalog, Translator};
use crate::core::mover::SafeFileMover;
use crate::core::scanner::{ImageScanner, ScanConfig, WalkDirScanner};
use crate::error::{CheckpointError, Result, ScanError};
use crate::events::{null_sender, Event, EventSender, PipelineEvent, PipelinePhase, RunSummary};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// How a run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// All phases finished and the per-folder state was removed
    Completed(RunSummary),
    /// Cancellation was observed during `phase`; run again to resume
    Cancelled { phase: PipelinePhase },
}

/// Immutable detector settings
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Minimum SSIM for two images to count as duplicates
    pub ssim_threshold: f64,
    /// Maximum pHash Hamming distance for a pair to be scored at all
    pub phash_threshold: u32,
    /// Log every SSIM score at debug level
    pub debug_log_ssim: bool,
    pub resume_file_name: String,
    pub loading_checkpoint_file_name: String,
    pub cache_file_name: String,
    /// Folder below the target that receives relocated files
    pub duplicates_dir_name: String,
    /// Pairs between two resume-state saves
    pub checkpoint_interval: usize,
    /// Directory for the run log and error log; `None` disables both files
    pub log_directory: Option<PathBuf>,
    pub language: String,
    pub locales_dir: Option<PathBuf>,
    pub include_hidden: bool,
    pub follow_symlinks: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ssim_threshold: 0.85,
            phash_threshold: 40,
            debug_log_ssim: false,
            resume_file_name: RESUME_FILE_NAME.to_string(),
            loading_checkpoint_file_name: LOADING_CHECKPOINT_FILE_NAME.to_string(),
            cache_file_name: CACHE_FILE_NAME.to_string(),
            duplicates_dir_name: "duplicates".to_string(),
            checkpoint_interval: 10,
            log_directory: None,
            language: "en".to_string(),
            locales_dir: None,
            include_hidden: true,
            follow_symlinks: false,
        }
    }
}

impl DetectorConfig {
    /// Bring every value into its supported range
    fn clamped(mut self) -> Self {
        self.ssim_threshold = if self.ssim_threshold.is_nan() {
            0.85
        } else {
            self.ssim_threshold.clamp(0.5, 1.0)
        };
        self.phash_threshold = self.phash_threshold.min(64);
        self.checkpoint_interval = self.checkpoint_interval.max(1);
        self
    }
}

/// Builder for [`DuplicateDetector`]
pub struct DetectorBuilder {
    config: DetectorConfig,
    events: Option<EventSender>,
    decoder: Option<Arc<dyn GrayDecoder>>,
    sniffer: Option<Arc<dyn FormatSniffer>>,
    converter: Option<Arc<dyn FormatConverter>>,
    catalog: Option<Arc<dyn MessageCatalog>>,
}

impl DetectorBuilder {
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::default(),
            events: None,
            decoder: None,
            sniffer: None,
            converter: None,
            catalog: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the SSIM threshold (clamped to 0.5..=1.0)
    pub fn ssim_threshold(mut self, threshold: f64) -> Self {
        self.config.ssim_threshold = threshold;
        self
    }

    /// Set the pHash threshold (clamped to 0..=64)
    pub fn phash_threshold(mut self, threshold: u32) -> Self {
        self.config.phash_threshold = threshold;
        self
    }

    pub fn debug_log_ssim(mut self, enabled: bool) -> Self {
        self.config.debug_log_ssim = enabled;
        self
    }

    pub fn resume_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.resume_file_name = name.into();
        self
    }

    pub fn loading_checkpoint_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.loading_checkpoint_file_name = name.into();
        self
    }

    pub fn cache_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.cache_file_name = name.into();
        self
    }

    pub fn duplicates_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.duplicates_dir_name = name.into();
        self
    }

    pub fn checkpoint_interval(mut self, pairs: usize) -> Self {
        self.config.checkpoint_interval = pairs;
        self
    }

    pub fn log_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.config.log_directory = dir;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn locales_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.locales_dir = dir;
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.config.include_hidden = include;
        self
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.config.follow_symlinks = follow;
        self
    }

    /// Send progress, log, stats and pipeline events to `events`
    pub fn events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn GrayDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn sniffer(mut self, sniffer: Arc<dyn FormatSniffer>) -> Self {
        self.sniffer = Some(sniffer);
        self
    }

    pub fn converter(mut self, converter: Arc<dyn FormatConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Use `catalog` instead of the translator for `language`
    pub fn catalog(mut self, catalog: Arc<dyn MessageCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> DuplicateDetector {
        let config = self.config.clamped();
        let events = self.events.unwrap_or_else(null_sender);

        let catalog = self.catalog.unwrap_or_else(|| {
            Arc::new(Translator::load(&config.language, config.locales_dir.as_deref()))
        });
        let logger = Arc::new(RunLogger::new(
            catalog,
            events.clone(),
            config.log_directory.clone(),
        ));
        let mover = Arc::new(SafeFileMover::new(logger.clone()));

        let normalizer = ImageNormalizer::new(
            self.converter.unwrap_or_else(|| Arc::new(SipsConverter)),
            self.sniffer.unwrap_or_else(|| Arc::new(MagicSniffer)),
            mover.clone(),
            logger.clone(),
        );
        let extractor =
            FeatureExtractor::new(self.decoder.unwrap_or_else(|| Arc::new(FastDecoder)));

        let scanner = WalkDirScanner::new(ScanConfig {
            follow_symlinks: config.follow_symlinks,
            include_hidden: config.include_hidden,
            excluded_dir_name: Some(config.duplicates_dir_name.clone()),
        });

        DuplicateDetector {
            cache_store: ImageCacheStore::new(config.cache_file_name.clone(), logger.clone()),
            loading_store: LoadingCheckpointStore::new(config.loading_checkpoint_file_name.clone()),
            resume_store: ResumeStore::new(config.resume_file_name.clone()),
            config,
            events,
            logger,
            mover,
            normalizer,
            extractor,
            scanner,
        }
    }
}

impl Default for DetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds duplicate images in a folder and moves them to `duplicates/`.
///
/// A run can be cancelled at any file or pair and resumed by running
/// again on the same folder.
pub struct DuplicateDetector {
    config: DetectorConfig,
    events: EventSender,
    logger: Arc<RunLogger>,
    mover: Arc<SafeFileMover>,
    normalizer: ImageNormalizer,
    extractor: FeatureExtractor,
    scanner: WalkDirScanner,
    cache_store: ImageCacheStore,
    loading_store: LoadingCheckpointStore,
    resume_store: ResumeStore,
}

impl DuplicateDetector {
    pub fn builder() -> DetectorBuilder {
        DetectorBuilder::new()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run every phase on `folder`.
    ///
    /// Fails only when `folder` is not an existing directory; cancellation
    /// is reported as [`RunOutcome::Cancelled`].
    pub fn run(&self, folder: &Path, token: &CancellationToken) -> Result<RunOutcome> {
        let started = Instant::now();
        let folder = fs::canonicalize(folder)
            .ok()
            .filter(|f| f.is_dir())
            .ok_or_else(|| ScanError::DirectoryNotFound {
                path: folder.to_path_buf(),
            })?;
        let folder = folder.as_path();
        let duplicates_dir = folder.join(&self.config.duplicates_dir_name);

        let mut summary = RunSummary {
            run_id: Uuid::new_v4(),
            ..RunSummary::default()
        };
        tracing::info!(run_id = %summary.run_id, folder = %folder.display(), "Starting run");
        self.events.send(Event::Pipeline(PipelineEvent::Started {
            run_id: summary.run_id,
            folder: folder.to_path_buf(),
        }));

        // Scanning
        self.enter(PipelinePhase::Scanning);
        self.logger
            .info("log.scanning_folder", &[("folder", &folder.display())]);
        let scan = self.scanner.scan(folder)?;
        summary.candidates = scan.files.len();
        summary.scan_errors = scan.errors.len();
        for error in &scan.errors {
            self.logger.warn_with(
                "log.scan_entry_skipped",
                &[("path", &error.path().display())],
                error,
            );
        }

        if scan.files.is_empty() {
            self.logger.info("log.no_images", &[]);
            self.remove_state(folder, &[StateFile::Cache]);
            return Ok(self.complete(summary, started));
        }
        self.logger
            .info("log.collected_candidates", &[("count", &scan.files.len())]);

        // Normalizing
        self.enter(PipelinePhase::Normalizing);
        if let Err(e) = fs::create_dir_all(&duplicates_dir) {
            tracing::warn!(path = %duplicates_dir.display(), error = %e, "Cannot create duplicates folder");
        }
        let mut paths = Vec::with_capacity(scan.files.len());
        for path in &scan.files {
            if token.is_cancelled() {
                return Ok(self.cancelled(PipelinePhase::Normalizing));
            }
            match self.normalizer.normalize(path, &duplicates_dir) {
                Some(normalized) => paths.push(normalized),
                None => {
                    if path.exists() {
                        self.mover.relocate_problem_file(path, &duplicates_dir);
                    }
                    summary.problem_files += 1;
                }
            }
        }

        // BuildingCache
        self.enter(PipelinePhase::BuildingCache);
        let mut progress = ProgressReporter::new(self.events.clone(), self.logger.clone());
        let snapshot = self.cache_store.load(folder);
        let checkpoint = self.loading_store.load(folder);
        let start_index = resume_index(&paths, checkpoint.as_ref());

        if start_index > 0 {
            let name = checkpoint
                .as_ref()
                .and_then(|c| c.path.as_ref())
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.logger.info(
                "log.resuming_loading",
                &[("index", &start_index), ("total", &paths.len()), ("name", &name)],
            );
        }
        self.logger
            .info("log.loading_cache", &[("count", &paths.len())]);

        let loader = CacheLoader {
            extractor: &self.extractor,
            store: &self.cache_store,
            mover: &self.mover,
            logger: &self.logger,
            folder,
            duplicates_dir: &duplicates_dir,
        };
        let mut records =
            match loader.load(&paths, &snapshot, start_index, token, &mut progress) {
                LoadOutcome::Completed {
                    records,
                    reused,
                    failed,
                } => {
                    summary.cache_reused = reused;
                    summary.problem_files += failed;
                    self.remove_state(folder, &[StateFile::Loading]);
                    self.logger.info(
                        "log.loading_done",
                        &[("count", &records.len()), ("reused", &reused)],
                    );
                    records
                }
                LoadOutcome::Cancelled {
                    completed,
                    last_path,
                } => {
                    let checkpoint = LoadingCheckpoint {
                        index: completed,
                        total: paths.len(),
                        path: last_path,
                    };
                    if let Err(e) = self.loading_store.save(folder, &checkpoint) {
                        self.report_save_failure(&self.loading_store.path(folder), &e);
                    }
                    self.logger
                        .warn("log.loading_interrupted", &[("count", &completed)]);
                    return Ok(self.cancelled(PipelinePhase::BuildingCache));
                }
            };

        // Sorting
        self.enter(PipelinePhase::Sorting);
        let resume = self.resume_store.load(folder);
        if let Some(state) = &resume {
            restore_moved_records(&mut records, &state.moved, |p| snapshot.get(p).cloned());
        }
        records.sort_by(|a, b| a.phash.cmp(&b.phash).then_with(|| a.path.cmp(&b.path)));
        summary.records = records.len();

        let n = records.len();
        if n < 2 {
            self.logger.info("log.only_one_image", &[]);
            summary.moved_total = resume.map(|s| s.moved.len()).unwrap_or(0);
            return Ok(self.finish(folder, summary, started));
        }

        // Comparing
        self.enter(PipelinePhase::Comparing);
        let mut state = match resume {
            Some(state) if state.cursor_is_valid(n) => {
                self.logger
                    .info("log.resuming_state", &[("i", &state.i), ("j", &state.j)]);
                state
            }
            Some(state) => {
                tracing::warn!(i = state.i, j = state.j, n, "Discarding out-of-range resume cursor");
                self.logger.info("log.starting_detection", &[]);
                ResumeState {
                    moved: state.moved,
                    ..fresh_cursor()
                }
            }
            None => {
                self.logger.info("log.starting_detection", &[]);
                fresh_cursor()
            }
        };

        let pass = ComparisonPass {
            comparator: PairComparator::new(
                self.config.ssim_threshold,
                self.config.phash_threshold,
                self.config.debug_log_ssim,
                &self.logger,
            ),
            resume_store: &self.resume_store,
            mover: &self.mover,
            logger: &self.logger,
            events: &self.events,
            folder,
            duplicates_dir: &duplicates_dir,
            checkpoint_interval: self.config.checkpoint_interval,
            started,
        };

        match pass.run(&records, &mut state, token, &mut progress) {
            CompareOutcome::Completed {
                pairs_compared,
                moved_this_run,
                moved_total,
            } => {
                summary.pairs_compared = pairs_compared;
                summary.moved_this_run = moved_this_run;
                summary.moved_total = moved_total;
                progress.refresh_eta();
                Ok(self.finish(folder, summary, started))
            }
            CompareOutcome::Cancelled => {
                self.remove_state(folder, &[StateFile::Loading]);
                self.logger.warn("log.detection_interrupted", &[]);
                Ok(self.cancelled(PipelinePhase::Comparing))
            }
        }
    }

    fn enter(&self, phase: PipelinePhase) {
        tracing::debug!(%phase, "Entering phase");
        self.events
            .send(Event::Pipeline(PipelineEvent::PhaseChanged { phase }));
    }

    fn finish(&self, folder: &Path, summary: RunSummary, started: Instant) -> RunOutcome {
        self.enter(PipelinePhase::Finalizing);
        self.remove_state(
            folder,
            &[StateFile::Resume, StateFile::Loading, StateFile::Cache],
        );
        self.logger.info("log.duplicates_complete", &[]);
        self.logger
            .info("log.moved_new_files", &[("count", &summary.moved_this_run)]);
        self.complete(summary, started)
    }

    fn complete(&self, mut summary: RunSummary, started: Instant) -> RunOutcome {
        summary.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %summary.run_id,
            records = summary.records,
            moved = summary.moved_this_run,
            duration_ms = summary.duration_ms,
            "Run complete"
        );
        self.events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: summary.clone(),
        }));
        RunOutcome::Completed(summary)
    }

    fn cancelled(&self, phase: PipelinePhase) -> RunOutcome {
        tracing::info!(%phase, "Run cancelled");
        self.events
            .send(Event::Pipeline(PipelineEvent::Cancelled { phase }));
        RunOutcome::Cancelled { phase }
    }

    fn remove_state(&self, folder: &Path, files: &[StateFile]) {
        for file in files {
            let result = match file {
                StateFile::Resume => self.resume_store.delete(folder).map_err(|e| e.to_string()),
                StateFile::Loading => self.loading_store.delete(folder).map_err(|e| e.to_string()),
                StateFile::Cache => self.cache_store.delete(folder).map_err(|e| e.to_string()),
            };
            if let Err(e) = result {
                tracing::warn!(file = ?file, error = %e, "Cannot remove run state");
            }
        }
    }

    fn report_save_failure(&self, path: &Path, error: &CheckpointError) {
        self.logger.warn_with(
            "log.checkpoint_save_failed",
            &[("path", &path.display())],
            error,
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum StateFile {
    Resume,
    Loading,
    Cache,
}

fn fresh_cursor() -> ResumeState {
    ResumeState {
        i: 0,
        j: 1,
        ..ResumeState::default()
    }
}

/// Put back records of files an earlier invocation already moved, so the
/// record list (and with it every cursor) matches the interrupted run
fn restore_moved_records<'a>(
    records: &mut Vec<ImageRecord>,
    moved: impl IntoIterator<Item = &'a PathBuf>,
    lookup: impl Fn(&Path) -> Option<ImageRecord>,
) {
    let present: HashSet<PathBuf> = records.iter().map(|r| r.path.clone()).collect();
    for path in moved {
        if present.contains(path) {
            continue;
        }
        if let Some(record) = lookup(path) {
            records.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HashError;
    use crate::events::{EventChannel, LogLevel};
    use image::{GrayImage, Luma};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingDecoder {
        calls: AtomicUsize,
    }

    impl GrayDecoder for CountingDecoder {
        fn decode_gray(&self, path: &Path) -> std::result::Result<GrayImage, HashError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            FastDecoder.decode_gray(path)
        }
    }

    fn scene(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let fx = x as f32 / size as f32;
            let fy = y as f32 / size as f32;
            Luma([(128.0 + 100.0 * (fx * 6.0).sin() * (fy * 4.0 + 0.5).cos()) as u8])
        })
    }

    fn checker(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let cell = (x * 8 / size + y * 8 / size) % 2;
            Luma([if cell == 0 { 20 } else { 230 }])
        })
    }

    fn rings(size: u32) -> GrayImage {
        let centre = size as f32 / 2.0;
        GrayImage::from_fn(size, size, |x, y| {
            let d = ((x as f32 - centre).powi(2) + (y as f32 - centre).powi(2)).sqrt();
            Luma([(128.0 + 110.0 * (d / 9.0).sin()) as u8])
        })
    }

    /// Six images: an exact copy pair, a resized pair and two unrelated ones
    fn populate(dir: &Path) {
        scene(256).save(dir.join("beach.png")).unwrap();
        fs::copy(dir.join("beach.png"), dir.join("beach copy.png")).unwrap();
        rings(256).save(dir.join("rings.png")).unwrap();
        image::imageops::resize(&rings(256), 128, 128, image::imageops::FilterType::Lanczos3)
            .save(dir.join("rings small.png"))
            .unwrap();
        checker(256).save(dir.join("checker.png")).unwrap();
        GrayImage::from_fn(256, 256, |x, _| Luma([(x % 64 * 4) as u8]))
            .save(dir.join("ramp.png"))
            .unwrap();
    }

    fn names(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().is_file())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn detector() -> DuplicateDetector {
        DuplicateDetector::builder().build()
    }

    fn completed(outcome: RunOutcome) -> RunSummary {
        match outcome {
            RunOutcome::Completed(summary) => summary,
            RunOutcome::Cancelled { phase } => panic!("run was cancelled during {phase}"),
        }
    }

    #[test]
    fn builder_clamps_thresholds() {
        let detector = DuplicateDetector::builder()
            .ssim_threshold(0.1)
            .phash_threshold(100)
            .checkpoint_interval(0)
            .build();

        assert_eq!(detector.config().ssim_threshold, 0.5);
        assert_eq!(detector.config().phash_threshold, 64);
        assert_eq!(detector.config().checkpoint_interval, 1);
    }

    #[test]
    fn missing_folder_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = detector().run(&dir.path().join("nope"), &CancellationToken::new());
        assert!(matches!(
            result,
            Err(crate::DedupError::Scan(ScanError::DirectoryNotFound { .. }))
        ));
    }

    #[test]
    fn empty_folder_completes_with_empty_summary() {
        let dir = TempDir::new().unwrap();
        let summary = completed(detector().run(dir.path(), &CancellationToken::new()).unwrap());

        assert_eq!(summary.candidates, 0);
        assert_eq!(summary.moved_this_run, 0);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_entries_are_logged_and_counted() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing.png"), dir.path().join("dangling.png"))
            .unwrap();
        let (sender, receiver) = EventChannel::new();

        let detector = DuplicateDetector::builder()
            .follow_symlinks(true)
            .events(sender)
            .build();
        let summary = completed(detector.run(dir.path(), &CancellationToken::new()).unwrap());
        drop(detector);

        assert_eq!(summary.scan_errors, 1);
        assert_eq!(summary.candidates, 0);
        assert!(receiver.iter().any(|e| matches!(
            e,
            Event::Log(entry) if entry.level == LogLevel::Warning && entry.message.starts_with("Skipped unreadable entry")
        )));
    }

    #[test]
    fn duplicates_are_relocated_and_state_removed() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());

        let summary = completed(detector().run(dir.path(), &CancellationToken::new()).unwrap());

        let duplicates = dir.path().join("duplicates");
        assert_eq!(summary.candidates, 6);
        assert_eq!(summary.records, 6);
        assert_eq!(summary.pairs_compared, 15);
        assert_eq!(summary.moved_this_run, 2);
        assert!(duplicates.join("rings small.png").exists());
        assert!(dir.path().join("rings.png").exists());
        assert_eq!(
            ["beach.png", "beach copy.png"]
                .iter()
                .filter(|n| duplicates.join(n).exists())
                .count(),
            1
        );
        assert!(names(dir.path()).iter().all(|n| !n.starts_with('.') && n != "resume.json"));
    }

    #[test]
    fn cancelled_build_writes_loading_checkpoint() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());

        // Six polls while normalizing, two files into the cache build
        let outcome = detector()
            .run(dir.path(), &CancellationToken::cancel_after(8))
            .unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Cancelled {
                phase: PipelinePhase::BuildingCache
            }
        ));
        let checkpoint = LoadingCheckpointStore::new(LOADING_CHECKPOINT_FILE_NAME)
            .load(dir.path())
            .unwrap();
        assert_eq!(checkpoint.index, 2);
        assert_eq!(checkpoint.total, 6);
        assert!(dir.path().join(CACHE_FILE_NAME).exists());
    }

    #[test]
    fn resumed_build_reuses_the_records_already_extracted() {
        let baseline = TempDir::new().unwrap();
        populate(baseline.path());
        completed(detector().run(baseline.path(), &CancellationToken::new()).unwrap());

        let dir = TempDir::new().unwrap();
        populate(dir.path());
        let first_decoder = Arc::new(CountingDecoder::default());
        let first = DuplicateDetector::builder()
            .decoder(first_decoder.clone())
            .build()
            .run(dir.path(), &CancellationToken::cancel_after(9))
            .unwrap();
        assert!(matches!(
            first,
            RunOutcome::Cancelled {
                phase: PipelinePhase::BuildingCache
            }
        ));
        assert_eq!(first_decoder.calls.load(Ordering::SeqCst), 3);

        let second_decoder = Arc::new(CountingDecoder::default());
        let summary = completed(
            DuplicateDetector::builder()
                .decoder(second_decoder.clone())
                .build()
                .run(dir.path(), &CancellationToken::new())
                .unwrap(),
        );

        assert_eq!(summary.cache_reused, 3);
        assert_eq!(second_decoder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(summary.records, 6);
        assert_eq!(
            names(&dir.path().join("duplicates")),
            names(&baseline.path().join("duplicates"))
        );
        assert_eq!(names(dir.path()), names(baseline.path()));
    }

    #[test]
    fn uninterrupted_build_reuses_nothing() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());

        let summary = completed(detector().run(dir.path(), &CancellationToken::new()).unwrap());

        assert_eq!(summary.cache_reused, 0);
    }

    #[test]
    fn cancelled_comparison_writes_resume_state() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());

        let outcome = detector()
            .run(dir.path(), &CancellationToken::cancel_after(20))
            .unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Cancelled {
                phase: PipelinePhase::Comparing
            }
        ));
        let state = ResumeStore::new(RESUME_FILE_NAME).load(dir.path()).unwrap();
        assert!(state.cursor_is_valid(6));
        assert_eq!(state.current_progress, 8);
        assert!(!dir.path().join(LOADING_CHECKPOINT_FILE_NAME).exists());
    }

    #[test]
    fn resumed_runs_match_an_uninterrupted_run() {
        let baseline = TempDir::new().unwrap();
        populate(baseline.path());
        completed(detector().run(baseline.path(), &CancellationToken::new()).unwrap());
        let expected_moved = names(&baseline.path().join("duplicates"));
        let expected_kept = names(baseline.path());

        for polls in [0, 3, 6, 9, 12, 14, 17, 20, 24, 26] {
            let dir = TempDir::new().unwrap();
            populate(dir.path());

            let first = detector()
                .run(dir.path(), &CancellationToken::cancel_after(polls))
                .unwrap();
            let second = completed(detector().run(dir.path(), &CancellationToken::new()).unwrap());

            assert_eq!(names(&dir.path().join("duplicates")), expected_moved, "polls={polls}");
            assert_eq!(names(dir.path()), expected_kept, "polls={polls}");
            if let RunOutcome::Cancelled { .. } = first {
                assert_eq!(second.moved_total, expected_moved.len(), "polls={polls}");
            }
        }
    }

    #[test]
    fn invalid_cursor_keeps_moved_set() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());
        let store = ResumeStore::new(RESUME_FILE_NAME);
        let stale = ResumeState {
            i: 40,
            j: 2,
            moved: BTreeSet::from([dir.path().join("elsewhere.png")]),
            current_progress: 99,
        };
        store.save(dir.path(), &stale).unwrap();

        let summary = completed(detector().run(dir.path(), &CancellationToken::new()).unwrap());

        assert_eq!(summary.pairs_compared, 15);
        assert_eq!(summary.moved_this_run, 2);
        assert_eq!(summary.moved_total, 3);
    }

    #[test]
    fn pipeline_events_bracket_the_run() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());
        let (sender, receiver) = EventChannel::new();

        let detector = DuplicateDetector::builder().events(sender).build();
        completed(detector.run(dir.path(), &CancellationToken::new()).unwrap());
        drop(detector);

        let events: Vec<Event> = receiver.iter().collect();
        assert!(matches!(
            events.first(),
            Some(Event::Pipeline(PipelineEvent::Started { .. }))
        ));
        assert!(matches!(
            events.last(),
            Some(Event::Pipeline(PipelineEvent::Completed { .. }))
        ));
        let phases: Vec<PipelinePhase> = events
            .iter()
            .filter_map(|e| match e {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            [
                PipelinePhase::Scanning,
                PipelinePhase::Normalizing,
                PipelinePhase::BuildingCache,
                PipelinePhase::Sorting,
                PipelinePhase::Comparing,
                PipelinePhase::Finalizing,
            ]
        );
        assert!(events.iter().any(|e| matches!(e, Event::Stats(_))));
        assert!(events.iter().any(
            |e| matches!(e, Event::Log(entry) if entry.level == LogLevel::Info && entry.message.starts_with("Moved"))
        ));
    }

    #[test]
    fn restore_skips_present_and_unknown_paths() {
        let make = |name: &str| ImageRecord {
            path: PathBuf::from(name),
            width: 1,
            height: 1,
            length: 1,
            phash: 0,
            digest: String::new(),
            pixels: Vec::new(),
        };
        let mut records = vec![make("a")];
        let moved = [PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")];

        restore_moved_records(&mut records, &moved, |p| {
            (p == Path::new("b")).then(|| make("b"))
        });

        let paths: Vec<_> = records.iter().map(|r| r.path.clone()).collect();
        assert_eq!(paths, [PathBuf::from("a"), PathBuf::from("b")]);
    }
}
