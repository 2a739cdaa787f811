//! Window arbitration for the timeout operator.
//!
//! A [`TimeoutController`] owns the window epoch: a monotonically
//! increasing index identifying which "expected next event" interval is
//! current. Three event sources race to resolve each window: the
//! producer (a value or terminal arrived), the armed trigger (the window
//! expired), and downstream cancellation. Every one of them resolves
//! the race through a single compare-and-set on the same integer, so
//! exactly one wins per window regardless of thread interleaving.
//!
//! # Invariants
//!
//! - A claim mutates the epoch or fails; the epoch is never read-then-
//!   written unguarded.
//! - `CLOSED` is absorbing: once any terminal claim succeeds, every later
//!   claim fails and the loser performs no downstream action.
//! - At most one pending trigger handle is live; arming replaces and
//!   cancels the superseded handle, and arming after `close` cancels the
//!   incoming handle (the slot stays closed).

use crate::source::{Subscription, SubscriptionSlot};
use std::sync::atomic::{AtomicU64, Ordering};

/// Terminal sentinel for the window epoch.
const CLOSED: u64 = u64::MAX;

/// Arbitrates races between "event arrived" and "window expired".
pub(crate) struct TimeoutController {
    window: AtomicU64,
    pending: SubscriptionSlot,
}

impl TimeoutController {
    /// Creates a controller with window 0 current and nothing armed.
    pub(crate) fn new() -> Self {
        Self {
            window: AtomicU64::new(0),
            pending: SubscriptionSlot::new(),
        }
    }

    /// Claims the current window for an arrived value.
    ///
    /// On success the epoch advances past the claimed window and the new
    /// window index is returned; the caller is now the only party allowed
    /// to arm it. `None` means an expiry (or terminal) already owns the
    /// outcome and the value must be dropped.
    pub(crate) fn advance(&self) -> Option<u64> {
        let current = self.window.load(Ordering::Acquire);
        if current == CLOSED {
            return None;
        }
        self.window
            .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| current + 1)
    }

    /// Claims `window` for its expiry trigger.
    ///
    /// Succeeds exactly once per window, and only while that window is
    /// still current: a value that arrived first advanced the epoch, and
    /// a terminal event or cancellation closed it, so the stale trigger
    /// loses either way.
    pub(crate) fn expire(&self, window: u64) -> bool {
        window != CLOSED
            && self
                .window
                .compare_exchange(window, CLOSED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Claims whatever window is current for a terminal event.
    ///
    /// Returns false if the controller was already closed.
    pub(crate) fn finish(&self) -> bool {
        self.window.swap(CLOSED, Ordering::AcqRel) != CLOSED
    }

    /// Installs the trigger handle for the window just opened, cancelling
    /// the superseded one.
    pub(crate) fn arm(&self, handle: Subscription) {
        self.pending.set(handle);
    }

    /// Closes the controller: no claim will succeed again, and the
    /// pending trigger handle (current or future) is cancelled.
    ///
    /// Idempotent; used on terminal delivery and downstream cancellation.
    pub(crate) fn close(&self) {
        self.window.store(CLOSED, Ordering::Release);
        self.pending.cancel();
    }
}
