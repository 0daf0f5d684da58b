//! # Logging Module
//!
//! The user-facing run log.
//!
//! Every entry is rendered through the [`MessageCatalog`], mirrored to
//! `tracing`, sent as an [`Event::Log`], and, when a log directory is
//! configured, appended to a monthly log file:
//!
//! ```text
//! [20240315 142501 000003] [Info] Collected 42 candidate files.
//! ```
//!
//! Entries that carry an error also append the error and its source
//! chain to a daily `error_traceback_YYYYmmdd.log`.

use crate::core::messages::{MessageArgs, MessageCatalog, Translator};
use crate::events::{null_sender, Event, EventSender, LogEntry, LogLevel};
use chrono::{DateTime, Local};
use std::error::Error;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SEPARATOR_WIDTH: usize = 50;

/// Run log shared by every stage of the detector
pub struct RunLogger {
    catalog: Arc<dyn MessageCatalog>,
    events: EventSender,
    log_dir: Option<PathBuf>,
    last_entry: Mutex<Option<DateTime<Local>>>,
}

impl RunLogger {
    /// Create a logger. The log directory is created on demand.
    pub fn new(
        catalog: Arc<dyn MessageCatalog>,
        events: EventSender,
        log_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(dir) = &log_dir {
            if let Err(e) = fs::create_dir_all(dir) {
                tracing::warn!(path = %dir.display(), error = %e, "Cannot create log directory");
            }
        }

        Self {
            catalog,
            events,
            log_dir,
            last_entry: Mutex::new(None),
        }
    }

    /// Render a catalog key without logging it
    pub fn text(&self, key: &str, args: MessageArgs<'_>) -> String {
        self.catalog.text(key, args)
    }

    pub fn info(&self, key: &str, args: MessageArgs<'_>) {
        self.log(LogLevel::Info, &self.text(key, args), None);
    }

    pub fn warn(&self, key: &str, args: MessageArgs<'_>) {
        self.log(LogLevel::Warning, &self.text(key, args), None);
    }

    pub fn debug(&self, key: &str, args: MessageArgs<'_>) {
        self.log(LogLevel::Debug, &self.text(key, args), None);
    }

    /// Log an error entry, recording `error` in the traceback log when present
    pub fn error(&self, key: &str, args: MessageArgs<'_>, error: Option<&dyn Error>) {
        self.log(LogLevel::Error, &self.text(key, args), error);
    }

    /// Log a warning that was caused by `error`
    pub fn warn_with(&self, key: &str, args: MessageArgs<'_>, error: &dyn Error) {
        self.log(LogLevel::Warning, &self.text(key, args), Some(error));
    }

    /// Write an already-rendered message
    pub fn log(&self, level: LogLevel, message: &str, error: Option<&dyn Error>) {
        match (level, error) {
            (LogLevel::Error, Some(e)) => tracing::error!(error = %e, "{message}"),
            (LogLevel::Error, None) => tracing::error!("{message}"),
            (LogLevel::Warning, Some(e)) => tracing::warn!(error = %e, "{message}"),
            (LogLevel::Warning, None) => tracing::warn!("{message}"),
            (LogLevel::Info, _) => tracing::info!("{message}"),
            (LogLevel::Debug, _) => tracing::debug!("{message}"),
        }

        let now = Local::now();
        let delta_ms = {
            let mut last = match self.last_entry.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let delta = last
                .map(|previous| (now - previous).num_milliseconds().max(0) as u64)
                .unwrap_or(0);
            *last = Some(now);
            delta
        };

        let entry = LogEntry {
            timestamp: now,
            delta_ms,
            level,
            message: message.to_string(),
        };

        if let Some(dir) = &self.log_dir {
            if let Err(e) = append(&run_log_path(dir, &now), &format_line(&entry)) {
                tracing::warn!(error = %e, "Cannot write run log file");
            }
            if let Some(error) = error {
                let block = format_traceback(&now, message, error);
                if let Err(e) = append(&traceback_path(dir, &now), &block) {
                    tracing::warn!(error = %e, "Cannot write error traceback file");
                }
            }
        }

        self.events.send(Event::Log(entry));
    }
}

impl Default for RunLogger {
    /// English messages, no listener and no log files
    fn default() -> Self {
        Self::new(Arc::new(Translator::english()), null_sender(), None)
    }
}

fn run_log_path(dir: &Path, now: &DateTime<Local>) -> PathBuf {
    dir.join(format!("image-dedup_{}.log", now.format("%Y%m")))
}

fn traceback_path(dir: &Path, now: &DateTime<Local>) -> PathBuf {
    dir.join(format!("error_traceback_{}.log", now.format("%Y%m%d")))
}

/// `[YYYYmmdd HHMMSS delta] [Level] message`; the first entry of a run has no delta
fn format_line(entry: &LogEntry) -> String {
    let delta = if entry.delta_ms == 0 {
        "------".to_string()
    } else {
        let secs = entry.delta_ms / 1000;
        format!("{:02}{:02}{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    };
    format!(
        "[{} {}] [{}] {}\n",
        entry.timestamp.format("%Y%m%d %H%M%S"),
        delta,
        entry.level,
        entry.message
    )
}

fn format_traceback(now: &DateTime<Local>, description: &str, error: &dyn Error) -> String {
    let separator = "-".repeat(SEPARATOR_WIDTH);
    let mut block = format!(
        "{separator}\n[{}] {description}\n{error}\n",
        now.format("%Y%m%d %H%M%S")
    );
    let mut source = error.source();
    while let Some(cause) = source {
        block.push_str(&format!("  caused by: {cause}\n"));
        source = cause.source();
    }
    block.push_str(&separator);
    block.push('\n');
    block
}

fn append(path: &Path, text: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())
}
