//! One-shot trigger source on a scheduler.
//!
//! [`timer`] emits a single `()` after a delay, then completes. Its main
//! use is as a timeout trigger: the first event of a trigger source is
//! what fires a window, so `timer(d, scheduler)` expresses "this window
//! lasts `d`" wherever a trigger source is expected.

use super::source::{DynObserver, Source};
use super::subscription::Subscription;
use crate::scheduler::Scheduler;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Creates a source that emits `()` once `delay` has elapsed on
/// `scheduler`, then completes.
#[must_use]
pub fn timer<E>(delay: Duration, scheduler: &Arc<dyn Scheduler>) -> Timer<E> {
    Timer {
        delay,
        scheduler: Arc::clone(scheduler),
        _error: PhantomData,
    }
}

/// Source returned by [`timer`].
#[derive(Clone)]
pub struct Timer<E> {
    delay: Duration,
    scheduler: Arc<dyn Scheduler>,
    _error: PhantomData<fn() -> E>,
}

impl<E: Send + 'static> Source for Timer<E> {
    type Item = ();
    type Error = E;

    fn subscribe(&self, downstream: DynObserver<(), E>) -> Subscription {
        self.scheduler.schedule_once(
            self.delay,
            Box::new(move || {
                downstream.on_next(());
                downstream.on_complete();
            }),
        )
    }
}
