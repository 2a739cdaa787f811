//! Real-clock scheduler backed by a worker thread.

use super::{Entry, Scheduler, Task};
use crate::source::Subscription;
use crate::time::{duration_to_nanos, Time};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// A scheduler that runs actions on a dedicated worker thread, measuring
/// time from its own start instant.
///
/// Dropping the scheduler shuts the worker down; actions still queued are
/// discarded. The process-global instance behind
/// [`default_scheduler`](super::default_scheduler) is never dropped.
pub struct ThreadScheduler {
    core: Arc<Core>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Core {
    origin: Instant,
    queue: Mutex<BinaryHeap<Entry>>,
    tick: Condvar,
    generation: AtomicU64,
    shutdown: AtomicBool,
}

impl Core {
    fn now(&self) -> Time {
        Time::from_nanos(duration_to_nanos(self.origin.elapsed()))
    }

    fn run(&self) {
        let mut queue = self.queue.lock();
        while !self.shutdown.load(Ordering::Acquire) {
            let now = self.now();
            if queue.peek().is_some_and(|entry| entry.due <= now) {
                if let Some(entry) = queue.pop() {
                    // Run with the queue unlocked so the action can
                    // schedule follow-up work.
                    MutexGuard::unlocked(&mut queue, || {
                        if !entry.is_cancelled() {
                            (entry.action)();
                        }
                    });
                }
                continue;
            }
            match queue.peek().map(|entry| entry.due) {
                Some(due) => {
                    let remaining = Duration::from_nanos(due.as_nanos().saturating_sub(now.as_nanos()));
                    match Instant::now().checked_add(remaining) {
                        Some(wake_at) => {
                            let _ = self.tick.wait_until(&mut queue, wake_at);
                        }
                        // Deadline beyond what Instant can represent:
                        // sleep until something new is scheduled.
                        None => self.tick.wait(&mut queue),
                    }
                }
                None => self.tick.wait(&mut queue),
            }
        }
    }
}

impl ThreadScheduler {
    /// Starts a new scheduler with its own worker thread.
    #[must_use]
    pub fn new() -> Self {
        let core = Arc::new(Core {
            origin: Instant::now(),
            queue: Mutex::new(BinaryHeap::new()),
            tick: Condvar::new(),
            generation: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        });
        let worker_core = Arc::clone(&core);
        let handle = std::thread::spawn(move || worker_core.run());
        Self {
            core,
            worker: Mutex::new(Some(handle)),
        }
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn now(&self) -> Time {
        self.core.now()
    }

    fn schedule_once(&self, delay: Duration, action: Task) -> Subscription {
        let entry = Entry {
            due: self.core.now().saturating_add(delay),
            generation: self.core.generation.fetch_add(1, Ordering::Relaxed),
            cancelled: Arc::new(AtomicBool::new(false)),
            action,
        };
        let handle = entry.cancel_handle();
        self.core.queue.lock().push(entry);
        self.core.tick.notify_one();
        handle
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.core.shutdown.store(true, Ordering::Release);
        self.core.tick.notify_all();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn runs_action_after_delay() {
        let scheduler = ThreadScheduler::new();
        let (tx, rx) = mpsc::channel();
        scheduler.schedule_once(
            Duration::from_millis(10),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        rx.recv_timeout(Duration::from_secs(5)).expect("action should run");
    }

    #[test]
    fn cancelled_action_never_runs() {
        let scheduler = ThreadScheduler::new();
        let (tx, rx) = mpsc::channel::<()>();
        let handle = scheduler.schedule_once(
            Duration::from_millis(50),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        handle.cancel();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn earlier_entries_run_first() {
        let scheduler = ThreadScheduler::new();
        let (tx, rx) = mpsc::channel();
        let tx2 = tx.clone();
        scheduler.schedule_once(
            Duration::from_millis(40),
            Box::new(move || {
                let _ = tx.send("late");
            }),
        );
        scheduler.schedule_once(
            Duration::from_millis(5),
            Box::new(move || {
                let _ = tx2.send("early");
            }),
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("early"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("late"));
    }

    #[test]
    fn clock_moves_forward() {
        let scheduler = ThreadScheduler::new();
        let before = scheduler.now();
        std::thread::sleep(Duration::from_millis(2));
        assert!(scheduler.now() > before);
    }
}
