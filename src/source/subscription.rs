//! Cancellation handles for push-stream resources.
//!
//! A [`Subscription`] is a composite cancellation set: it owns on-cancel
//! actions and child subscriptions, and cancelling it releases all of them.
//! A [`SubscriptionSlot`] holds at most one subscription at a time,
//! cancelling the displaced one on replacement; once the slot itself is
//! cancelled, anything set into it afterwards is cancelled immediately.
//! That last rule is what resolves the "handle arrives after the race is
//! already lost" orderings without holding a lock across user callbacks.
//!
//! # Cancellation discipline
//!
//! `cancel()` is idempotent. Actions and children are drained under the
//! lock but invoked after it is released, so a cancel action may itself
//! touch other subscriptions without deadlocking.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type CancelAction = Box<dyn FnOnce() + Send>;

enum Resource {
    Action(CancelAction),
    Child(Subscription),
}

impl Resource {
    fn release(self) {
        match self {
            Self::Action(run) => run(),
            Self::Child(child) => child.cancel(),
        }
    }
}

/// A composite, idempotently cancellable handle to stream resources.
///
/// Cloning shares the same underlying set: cancelling any clone cancels
/// them all.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    // Two inline slots cover the common case: one upstream handle plus one
    // cleanup action.
    resources: Mutex<SmallVec<[Resource; 2]>>,
}

impl Subscription {
    /// Creates a new, live subscription with no resources attached.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                resources: Mutex::new(SmallVec::new()),
            }),
        }
    }

    /// Creates a subscription that runs `action` once when cancelled.
    #[must_use]
    pub fn from_action(action: impl FnOnce() + Send + 'static) -> Self {
        let sub = Self::new();
        sub.on_cancel(action);
        sub
    }

    /// Creates an already-cancelled subscription.
    #[must_use]
    pub fn cancelled() -> Self {
        let sub = Self::new();
        sub.cancel();
        sub
    }

    /// Returns true once [`cancel`](Self::cancel) has been observed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Registers `action` to run on cancellation.
    ///
    /// If this subscription is already cancelled, `action` runs immediately
    /// on the calling thread.
    pub fn on_cancel(&self, action: impl FnOnce() + Send + 'static) {
        self.attach(Resource::Action(Box::new(action)));
    }

    /// Attaches `child` so that cancelling `self` cancels it too.
    ///
    /// If this subscription is already cancelled, `child` is cancelled
    /// immediately.
    pub fn add(&self, child: Subscription) {
        self.attach(Resource::Child(child));
    }

    fn attach(&self, resource: Resource) {
        if !self.is_cancelled() {
            let mut resources = self.inner.resources.lock();
            if !self.is_cancelled() {
                resources.push(resource);
                return;
            }
        }
        // Lost to a concurrent cancel: release on this thread instead.
        resource.release();
    }

    /// Cancels this subscription, releasing every attached resource.
    ///
    /// The first caller drains and releases; later calls are no-ops.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let drained = std::mem::take(&mut *self.inner.resources.lock());
        for resource in drained {
            resource.release();
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

enum SlotState {
    Live(Option<Subscription>),
    Cancelled,
}

/// A serial subscription slot: holds the current handle for one role.
///
/// [`set`](Self::set) replaces the occupant, cancelling the one it
/// displaced. After [`cancel`](Self::cancel), the slot stays cancelled and
/// every later `set` cancels the incoming handle instead of storing it.
#[derive(Clone)]
pub struct SubscriptionSlot {
    state: Arc<Mutex<SlotState>>,
}

impl SubscriptionSlot {
    /// Creates an empty, live slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SlotState::Live(None))),
        }
    }

    /// Returns true once the slot has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.state.lock(), SlotState::Cancelled)
    }

    /// Installs `sub` as the current occupant.
    ///
    /// Cancels the displaced occupant, or `sub` itself if the slot is
    /// already cancelled. Cancellation happens after the slot lock is
    /// released.
    pub fn set(&self, sub: Subscription) {
        let doomed = {
            let mut state = self.state.lock();
            match &mut *state {
                SlotState::Cancelled => Some(sub),
                SlotState::Live(current) => current.replace(sub),
            }
        };
        if let Some(sub) = doomed {
            sub.cancel();
        }
    }

    /// Cancels the slot and its current occupant, if any.
    pub fn cancel(&self) {
        let current = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, SlotState::Cancelled) {
                SlotState::Live(current) => current,
                SlotState::Cancelled => None,
            }
        };
        if let Some(sub) = current {
            sub.cancel();
        }
    }
}

impl Default for SubscriptionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriptionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSlot")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_action(count: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn cancel_runs_actions_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let sub = Subscription::new();
        sub.on_cancel(counter_action(&count));

        sub.cancel();
        sub.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(sub.is_cancelled());
    }

    #[test]
    fn cancel_propagates_to_children() {
        let count = Arc::new(AtomicUsize::new(0));
        let parent = Subscription::new();
        let child = Subscription::from_action(counter_action(&count));
        parent.add(child.clone());

        parent.cancel();
        assert!(child.is_cancelled());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn add_after_cancel_cancels_immediately() {
        let parent = Subscription::cancelled();
        let child = Subscription::new();
        parent.add(child.clone());
        assert!(child.is_cancelled());
    }

    #[test]
    fn on_cancel_after_cancel_runs_inline() {
        let count = Arc::new(AtomicUsize::new(0));
        let sub = Subscription::cancelled();
        sub.on_cancel(counter_action(&count));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_cancellation() {
        let a = Subscription::new();
        let b = a.clone();
        b.cancel();
        assert!(a.is_cancelled());
    }

    #[test]
    fn slot_replacement_cancels_displaced() {
        let slot = SubscriptionSlot::new();
        let first = Subscription::new();
        let second = Subscription::new();

        slot.set(first.clone());
        slot.set(second.clone());
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        slot.cancel();
        assert!(second.is_cancelled());
    }

    #[test]
    fn set_after_slot_cancel_cancels_incoming() {
        let slot = SubscriptionSlot::new();
        slot.cancel();

        let late = Subscription::new();
        slot.set(late.clone());
        assert!(late.is_cancelled());
        assert!(slot.is_cancelled());
    }
}
