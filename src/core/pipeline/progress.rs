//! Phase progress and ETA texts for the presentation layer.

use crate::core::logging::RunLogger;
use crate::events::{Event, EventSender, PipelinePhase, ProgressUpdate};
use chrono::{Duration, Local};
use std::sync::Arc;
use std::time::Instant;

const ETA_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Tracks the counters of the running phase and emits [`ProgressUpdate`]s
pub struct ProgressReporter {
    events: EventSender,
    logger: Arc<RunLogger>,
    phase: PipelinePhase,
    total: usize,
    completed: usize,
    eta_text: String,
    /// Units already done when the phase (re)started; excluded from the rate
    baseline: usize,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(events: EventSender, logger: Arc<RunLogger>) -> Self {
        let eta_text = logger.text("status.estimating", &[]);
        Self {
            events,
            logger,
            phase: PipelinePhase::Scanning,
            total: 1,
            completed: 0,
            eta_text,
            baseline: 0,
            started: Instant::now(),
        }
    }

    /// Enter `phase` with `total` units, `resumed_from` of which are already done
    pub fn start_phase(&mut self, phase: PipelinePhase, total: usize, resumed_from: usize) {
        self.phase = phase;
        self.total = total.max(1);
        self.completed = resumed_from;
        self.baseline = resumed_from;
        self.started = Instant::now();
        self.eta_text = self.logger.text("status.estimating", &[]);
        self.emit();
    }

    pub fn report(&mut self, completed: usize) {
        self.completed = completed;
        self.emit();
    }

    /// Recompute the ETA from the rate observed since the phase started
    pub fn refresh_eta(&mut self) {
        let done = self.completed.saturating_sub(self.baseline);
        let remaining = self.total.saturating_sub(self.completed);

        self.eta_text = if remaining == 0 {
            self.logger.text("status.done", &[])
        } else if done == 0 {
            self.logger.text("status.estimating", &[])
        } else {
            let per_unit_ms = self.started.elapsed().as_millis() as f64 / done as f64;
            let remaining_ms = (per_unit_ms * remaining as f64) as i64;
            (Local::now() + Duration::milliseconds(remaining_ms))
                .format(ETA_FORMAT)
                .to_string()
        };
        self.emit();
    }

    fn emit(&self) {
        self.events.send(Event::Progress(ProgressUpdate {
            completed: self.completed,
            total: self.total,
            phase: self.phase,
            eta_text: self.eta_text.clone(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::messages::Translator;
    use crate::events::{null_sender, EventChannel, EventReceiver};

    fn reporter() -> (ProgressReporter, EventReceiver) {
        let (sender, receiver) = EventChannel::new();
        let logger = Arc::new(RunLogger::new(
            Arc::new(Translator::english()),
            null_sender(),
            None,
        ));
        (ProgressReporter::new(sender, logger), receiver)
    }

    fn progress_updates(receiver: &EventReceiver) -> Vec<ProgressUpdate> {
        std::iter::from_fn(|| receiver.try_recv())
            .filter_map(|event| match event {
                Event::Progress(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_phase_emits_estimating() {
        let (mut reporter, receiver) = reporter();
        reporter.start_phase(PipelinePhase::BuildingCache, 0, 0);

        let updates = progress_updates(&receiver);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].total, 1);
        assert_eq!(updates[0].phase, PipelinePhase::BuildingCache);
        assert_eq!(updates[0].eta_text, "Estimating...");
    }

    #[test]
    fn eta_is_a_timestamp_once_work_is_done() {
        let (mut reporter, receiver) = reporter();
        reporter.start_phase(PipelinePhase::Comparing, 100, 0);
        reporter.report(10);
        reporter.refresh_eta();

        let last = progress_updates(&receiver).pop().unwrap();
        assert_eq!(last.completed, 10);
        assert!(chrono::NaiveDateTime::parse_from_str(&last.eta_text, ETA_FORMAT).is_ok());
    }

    #[test]
    fn eta_reports_done_when_nothing_remains() {
        let (mut reporter, receiver) = reporter();
        reporter.start_phase(PipelinePhase::Comparing, 20, 0);
        reporter.report(20);
        reporter.refresh_eta();

        assert_eq!(progress_updates(&receiver).pop().unwrap().eta_text, "Done");
    }

    #[test]
    fn resumed_units_do_not_count_towards_the_rate() {
        let (mut reporter, receiver) = reporter();
        reporter.start_phase(PipelinePhase::Comparing, 100, 40);
        reporter.refresh_eta();

        let last = progress_updates(&receiver).pop().unwrap();
        assert_eq!(last.completed, 40);
        assert_eq!(last.eta_text, "Estimating...");
    }
}
