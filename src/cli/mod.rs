//! # CLI Module
//!
//! Command-line interface for the image deduper.
//!
//! ## Usage
//! ```bash
//! # Move duplicates below ~/Pictures into ~/Pictures/duplicates
//! image-dedup run ~/Pictures
//!
//! # Stricter visual matching
//! image-dedup run ~/Pictures --ssim-threshold 0.95 --phash-threshold 20
//!
//! # Every run log entry, JSON summary
//! image-dedup run ~/Pictures --verbose --output json
//! ```
//!
//! Ctrl-C stops the run after the current file or pair; running the same
//! command again resumes it.

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use image_deduper::core::pipeline::{CancellationToken, DuplicateDetector, RunOutcome};
use image_deduper::error::{DedupError, Result};
use image_deduper::events::{Event, EventChannel, LogLevel, PipelineEvent, RunSummary};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::thread;

/// Image Deduper - move duplicate images aside, resumably
#[derive(Parser, Debug)]
#[command(name = "image-dedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find duplicates in a folder and move them to its `duplicates` folder
    Run {
        /// Folder to deduplicate
        folder: PathBuf,

        /// Minimum SSIM score for a visual match (0.5-1.0)
        #[arg(long, default_value = "0.85")]
        ssim_threshold: f64,

        /// Maximum perceptual-hash distance before SSIM is skipped (0-64)
        #[arg(long, default_value = "40")]
        phash_threshold: u32,

        /// Language of the run log
        #[arg(long, default_value = "en")]
        language: String,

        /// Folder with `<language>.json` message files
        #[arg(long)]
        locales_dir: Option<PathBuf>,

        /// Folder for the run log and error log
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Do not write log files
        #[arg(long)]
        no_log_file: bool,

        /// Log every SSIM score
        #[arg(long)]
        debug_ssim: bool,

        /// Print every run log entry
        #[arg(short, long)]
        verbose: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Options of the `run` command
struct RunOptions {
    folder: PathBuf,
    ssim_threshold: f64,
    phash_threshold: u32,
    language: String,
    locales_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    debug_ssim: bool,
    verbose: bool,
    output: OutputFormat,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            folder,
            ssim_threshold,
            phash_threshold,
            language,
            locales_dir,
            log_dir,
            no_log_file,
            debug_ssim,
            verbose,
            output,
        } => run_detector(RunOptions {
            folder,
            ssim_threshold,
            phash_threshold,
            language,
            locales_dir,
            log_dir: if no_log_file {
                None
            } else {
                log_dir.or_else(default_log_dir)
            },
            debug_ssim,
            verbose,
            output,
        }),
    }
}

fn default_log_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("image-deduper").join("logs"))
}

fn run_detector(options: RunOptions) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(options.output, OutputFormat::Pretty);

    if pretty {
        term.write_line(&format!(
            "{} {}",
            style("Image Deduper").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| DedupError::Config(format!("Cannot install Ctrl-C handler: {e}")))?;

    let (sender, receiver) = EventChannel::new();
    let detector = DuplicateDetector::builder()
        .ssim_threshold(options.ssim_threshold)
        .phash_threshold(options.phash_threshold)
        .language(options.language)
        .locales_dir(options.locales_dir)
        .log_directory(options.log_dir)
        .debug_log_ssim(options.debug_ssim)
        .events(sender)
        .build();

    let progress = pretty.then(|| {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        pb
    });

    let progress_clone = progress.clone();
    let verbose = options.verbose;

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_message(phase.to_string());
                    }
                }
                Event::Progress(p) => {
                    if let Some(ref pb) = progress_clone {
                        pb.set_length(p.total as u64);
                        pb.set_position(p.completed as u64);
                        pb.set_message(format!("{} (ETA {})", p.phase, p.eta_text));
                    }
                }
                Event::Log(entry) => {
                    let shown = verbose || matches!(entry.level, LogLevel::Warning | LogLevel::Error);
                    if !shown {
                        continue;
                    }
                    let line = match entry.level {
                        LogLevel::Error => style(entry.message).red().to_string(),
                        LogLevel::Warning => style(entry.message).yellow().to_string(),
                        LogLevel::Debug => style(entry.message).dim().to_string(),
                        LogLevel::Info => entry.message,
                    };
                    match progress_clone {
                        Some(ref pb) => pb.println(line),
                        None => eprintln!("{line}"),
                    }
                }
                Event::Pipeline(PipelineEvent::Completed { .. })
                | Event::Pipeline(PipelineEvent::Cancelled { .. }) => {
                    if let Some(ref pb) = progress_clone {
                        pb.finish_and_clear();
                    }
                }
                _ => {}
            }
        }
    });

    let result = detector.run(&options.folder, &token);

    // Drop every sender so the event thread finishes
    drop(detector);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    match (result?, options.output) {
        (RunOutcome::Completed(summary), OutputFormat::Pretty) => print_pretty_summary(&term, &summary),
        (RunOutcome::Completed(summary), OutputFormat::Json) => print_json(&serde_json::json!({
            "status": "completed",
            "summary": summary,
        })),
        (RunOutcome::Cancelled { phase }, OutputFormat::Pretty) => {
            term.write_line(&format!(
                "{} Cancelled during {}. Run the same command again to resume.",
                style("!").yellow().bold(),
                phase
            ))
            .ok();
        }
        (RunOutcome::Cancelled { phase }, OutputFormat::Json) => print_json(&serde_json::json!({
            "status": "cancelled",
            "phase": phase,
        })),
    }

    Ok(())
}

fn print_pretty_summary(term: &Term, summary: &RunSummary) {
    term.write_line(&format!("{} Run Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} images found in {:.1}s",
        style(summary.candidates).cyan(),
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} images compared ({} pairs)",
        style(summary.records).cyan(),
        summary.pairs_compared
    ))
    .ok();
    term.write_line(&format!(
        "  {} duplicates moved",
        style(summary.moved_this_run).cyan()
    ))
    .ok();

    if summary.moved_total > summary.moved_this_run {
        term.write_line(&format!(
            "  {} moved in total, including earlier interrupted runs",
            style(summary.moved_total).dim()
        ))
        .ok();
    }
    if summary.cache_reused > 0 {
        term.write_line(&format!(
            "  {} reused from cache",
            style(summary.cache_reused).dim()
        ))
        .ok();
    }
    if summary.scan_errors > 0 {
        term.write_line(&format!(
            "  {} entries could not be read",
            style(summary.scan_errors).yellow()
        ))
        .ok();
    }
    if summary.problem_files > 0 {
        term.write_line(&format!(
            "  {} unreadable files moved aside",
            style(summary.problem_files).yellow()
        ))
        .ok();
    }

    term.write_line("").ok();
    term.write_line(&format!(
        "{}",
        style("Nothing was deleted except byte-identical copies. Review the duplicates folder before emptying it.").dim()
    ))
    .ok();
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Cannot serialize output: {e}"),
    }
}
