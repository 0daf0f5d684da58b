//! Cooperative cancellation shared between the detector and its caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(test)]
use std::sync::atomic::AtomicUsize;

/// Cloneable cancellation flag.
///
/// The detector polls it once per file and once per pair; setting it from
/// any clone (a Ctrl-C handler, a UI thread) stops the run at the next poll.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    #[cfg(test)]
    budget: Option<Arc<AtomicUsize>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.spend_budget();
        self.flag.load(Ordering::SeqCst)
    }

    /// A token that cancels itself on the poll after `polls` successful ones
    #[cfg(test)]
    pub(crate) fn cancel_after(polls: usize) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            budget: Some(Arc::new(AtomicUsize::new(polls))),
        }
    }

    #[cfg(test)]
    fn spend_budget(&self) {
        if let Some(budget) = &self.budget {
            let exhausted = budget
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_err();
            if exhausted {
                self.cancel();
            }
        }
    }

    #[cfg(not(test))]
    fn spend_budget(&self) {}
}
