//! Deterministic scheduler on a manually advanced clock.
//!
//! [`VirtualScheduler`] never runs anything on its own: time only moves
//! when the test driver calls [`advance_by`](VirtualScheduler::advance_by)
//! or [`advance_to`](VirtualScheduler::advance_to), and due actions run on
//! the driving thread, in deadline order (insertion order breaks ties).
//! Actions scheduled *during* an advance are honored in the same advance
//! when their deadline falls inside the advanced range, so timer chains
//! unfold exactly as they would on a real clock.

use super::{Entry, Scheduler, Task};
use crate::source::Subscription;
use crate::time::Time;
use parking_lot::Mutex;
use std::collections::BinaryHeap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

struct Clockwork {
    now: Time,
    queue: BinaryHeap<Entry>,
    generation: u64,
}

/// A virtual-clock scheduler for deterministic tests.
///
/// The clock starts at [`Time::ZERO`].
pub struct VirtualScheduler {
    state: Mutex<Clockwork>,
}

impl VirtualScheduler {
    /// Creates a scheduler with its clock at [`Time::ZERO`] and an empty
    /// queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Clockwork {
                now: Time::ZERO,
                queue: BinaryHeap::new(),
                generation: 0,
            }),
        }
    }

    /// Moves the clock forward by `delta`, running every due action.
    pub fn advance_by(&self, delta: Duration) {
        let target = self.state.lock().now.saturating_add(delta);
        self.advance_to(target);
    }

    /// Moves the clock forward to `target`, running every action whose
    /// deadline is at-or-before it. Does nothing if `target` is in the
    /// past.
    pub fn advance_to(&self, target: Time) {
        loop {
            let due = {
                let mut state = self.state.lock();
                if target < state.now {
                    return;
                }
                let ready = state
                    .queue
                    .peek()
                    .is_some_and(|entry| entry.due <= target);
                if !ready {
                    state.now = target;
                    return;
                }
                let entry = state.queue.pop();
                if let Some(entry) = &entry {
                    state.now = state.now.max(entry.due);
                }
                entry
            };
            // Run with the state unlocked: the action may schedule more
            // work, and deadlines inside the range join this advance.
            if let Some(entry) = due {
                if !entry.is_cancelled() {
                    (entry.action)();
                }
            }
        }
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for VirtualScheduler {
    fn now(&self) -> Time {
        self.state.lock().now
    }

    fn schedule_once(&self, delay: Duration, action: Task) -> Subscription {
        let mut state = self.state.lock();
        let entry = Entry {
            due: state.now.saturating_add(delay),
            generation: state.generation,
            cancelled: Arc::new(AtomicBool::new(false)),
            action,
        };
        state.generation += 1;
        let handle = entry.cancel_handle();
        state.queue.push(entry);
        handle
    }
}
