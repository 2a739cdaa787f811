//! Delayed-task scheduling.
//!
//! A [`Scheduler`] executes actions at-or-after a delay on its own clock
//! and hands back a cancellation handle. Two implementations are provided:
//! [`ThreadScheduler`] runs against the real clock on a dedicated worker
//! thread, and [`VirtualScheduler`] runs against a virtual clock advanced
//! manually by a test driver, which makes timing behavior fully
//! deterministic.
//!
//! Operators that are not handed a scheduler fall back to
//! [`default_scheduler`], a lazily-started process-global
//! [`ThreadScheduler`].

mod thread;
mod virtual_clock;

pub use thread::ThreadScheduler;
pub use virtual_clock::VirtualScheduler;

use crate::source::Subscription;
use crate::time::Time;
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Executes delayed actions on a real or virtual clock.
pub trait Scheduler: Send + Sync {
    /// Reads the scheduler's clock.
    fn now(&self) -> Time;

    /// Schedules `action` to run once, at-or-after `delay` from now.
    ///
    /// Cancelling the returned [`Subscription`] prevents an action that
    /// has not yet started; cancelling a started or finished action is a
    /// no-op.
    fn schedule_once(&self, delay: Duration, action: Task) -> Subscription;
}

/// Returns the ambient scheduler: a shared, lazily-started
/// [`ThreadScheduler`] that lives for the rest of the process.
#[must_use]
pub fn default_scheduler() -> Arc<dyn Scheduler> {
    static AMBIENT: OnceLock<Arc<ThreadScheduler>> = OnceLock::new();
    Arc::clone(AMBIENT.get_or_init(|| Arc::new(ThreadScheduler::new()))) as Arc<dyn Scheduler>
}

/// A queued action. Ordered by deadline, then by insertion order, reversed
/// so a max-heap pops the earliest entry first.
pub(crate) struct Entry {
    pub(crate) due: Time,
    pub(crate) generation: u64,
    pub(crate) cancelled: Arc<AtomicBool>,
    pub(crate) action: Task,
}

impl Entry {
    pub(crate) fn cancel_handle(&self) -> Subscription {
        let cancelled = Arc::clone(&self.cancelled);
        Subscription::from_action(move || {
            cancelled.store(true, std::sync::atomic::Ordering::Release);
        })
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::Acquire)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.generation == other.generation
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
