//! Event type definitions for progress reporting.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// All events emitted by the duplicate detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Progress within the current phase
    Progress(ProgressUpdate),
    /// A user-facing run log entry
    Log(LogEntry),
    /// Running totals for the comparison phase
    Stats(StatsSnapshot),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Progress information for the phase currently running
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Units completed (files in BuildingCache, pairs in Comparing)
    pub completed: usize,
    /// Total units in the phase (never less than 1)
    pub total: usize,
    /// Phase the counters belong to
    pub phase: PipelinePhase,
    /// Estimated finishing time or a status text
    pub eta_text: String,
}

/// Severity of a run log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "Info"),
            LogLevel::Warning => write!(f, "Warning"),
            LogLevel::Error => write!(f, "Error"),
            LogLevel::Debug => write!(f, "Debug"),
        }
    }
}

/// A single run log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was written
    pub timestamp: DateTime<Local>,
    /// Time since the previous entry in milliseconds (0 for the first one)
    pub delta_ms: u64,
    /// Severity
    pub level: LogLevel,
    /// Already-formatted display text
    pub message: String,
}

/// Snapshot of comparison totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Number of records taking part in the comparison
    pub total_sources: usize,
    /// Number of base images fully or partially processed
    pub processed_base: usize,
    /// Files relocated so far (including earlier, resumed runs)
    pub moved: usize,
    /// Time since the run started in milliseconds
    pub elapsed_ms: u64,
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A run has started
    Started { run_id: Uuid, folder: PathBuf },
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// The run completed and its checkpoints were removed
    Completed { summary: RunSummary },
    /// The run was cancelled; progress was checkpointed where the phase supports it
    Cancelled { phase: PipelinePhase },
}

/// States of the duplicate detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Scanning,
    Normalizing,
    BuildingCache,
    Sorting,
    Comparing,
    Finalizing,
}

/// Summary of a completed run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Identifier of the run, also written to the run log
    pub run_id: Uuid,
    /// Supported files found by the scanner
    pub candidates: usize,
    /// Entries the scanner could not read
    pub scan_errors: usize,
    /// Files relocated because they could not be normalized or decoded
    pub problem_files: usize,
    /// Records taking part in the comparison
    pub records: usize,
    /// Records reused from the cache instead of being extracted again
    pub cache_reused: usize,
    /// Pairs compared in total (including resumed progress)
    pub pairs_compared: usize,
    /// Duplicates relocated by this invocation
    pub moved_this_run: usize,
    /// Duplicates relocated across all resumed invocations
    pub moved_total: usize,
    /// Duration of this invocation in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Scanning => write!(f, "Scanning"),
            PipelinePhase::Normalizing => write!(f, "Normalizing"),
            PipelinePhase::BuildingCache => write!(f, "Building cache"),
            PipelinePhase::Sorting => write!(f, "Sorting"),
            PipelinePhase::Comparing => write!(f, "Comparing"),
            PipelinePhase::Finalizing => write!(f, "Finalizing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Progress(ProgressUpdate {
            completed: 10,
            total: 50,
            phase: PipelinePhase::Comparing,
            eta_text: "Estimating...".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Progress(p) => {
                assert_eq!(p.completed, 10);
                assert_eq!(p.phase, PipelinePhase::Comparing);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn run_summary_is_serializable() {
        let summary = RunSummary {
            candidates: 1000,
            moved_total: 150,
            duration_ms: 5000,
            ..RunSummary::default()
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"moved_total\":150"));
    }

    #[test]
    fn phase_display_is_readable() {
        assert_eq!(PipelinePhase::BuildingCache.to_string(), "Building cache");
        assert_eq!(PipelinePhase::Comparing.to_string(), "Comparing");
    }
}
