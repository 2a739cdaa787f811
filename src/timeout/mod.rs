//! Quiescence deadlines for push sequences.
//!
//! The timeout operator enforces a maximum quiet interval on a source: if
//! no value arrives within the current window (the first window opens at
//! subscription, and each accepted value opens the next), the operator
//! either fails downstream with [`Elapsed`] or switches delivery to a
//! fallback source. Windows come in two flavors sharing one arbitration
//! protocol:
//!
//! - **fixed**: every window is the same scheduler-measured duration;
//! - **per-item**: a selector maps each accepted value to a trigger
//!   source whose first event (of any kind) expires the window it guards.
//!
//! # Guarantees
//!
//! Downstream observes accepted values in arrival order followed by
//! exactly one terminal signal, or a clean fallback switch followed by
//! the fallback's own output: never both a timeout and a later value,
//! and never two terminals. A value racing the expiry at the same instant
//! resolves to exactly one of the two outcomes. Cancelling the returned
//! subscription releases the live upstream (primary or fallback) and the
//! pending trigger synchronously.
//!
//! # Example
//!
//! ```ignore
//! use vigil::prelude::*;
//! use std::time::Duration;
//!
//! let guarded = sensor_readings()
//!     .timeout_or(Duration::from_secs(3), cached_readings());
//! // Downstream switches to the cache if the sensor goes quiet.
//! ```

mod controller;
mod coordinator;
mod elapsed;

pub use elapsed::Elapsed;

use coordinator::{ExpireMode, TimeoutCoordinator, WindowPolicy};

use crate::scheduler::{default_scheduler, Scheduler};
use crate::source::{DynObserver, DynSource, Source, SourceExt, Subscription};
use std::sync::Arc;
use std::time::Duration;

/// A source wrapped with a timeout window policy.
///
/// Produced by the [`TimeoutExt`] methods; behaves as a [`Source`] and
/// may be subscribed multiple times, each subscription getting its own
/// windows.
pub struct TimedSource<T, E> {
    source: DynSource<T, E>,
    scheduler: Arc<dyn Scheduler>,
    windows: WindowPolicy<T, E>,
    on_expire: ExpireMode<T, E>,
}

impl<T, E> Source for TimedSource<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, downstream: DynObserver<T, E>) -> Subscription {
        TimeoutCoordinator::subscribe(
            &self.source,
            downstream,
            Arc::clone(&self.scheduler),
            self.windows.clone(),
            self.on_expire.clone(),
        )
    }
}

fn synthesize_elapsed<T, E>(after: Option<Duration>) -> ExpireMode<T, E>
where
    E: From<Elapsed> + 'static,
{
    ExpireMode::Error(Arc::new(move |window| E::from(Elapsed::new(window, after))))
}

/// Timeout entry points, available on every source.
pub trait TimeoutExt: Source + Sized + Send + Sync + 'static
where
    Self::Item: Send + Sync + 'static,
    Self::Error: Send + Sync + 'static,
{
    /// Fails with [`Elapsed`] if any quiet gap (including the one before
    /// the first value) reaches `window`. Runs on the ambient scheduler.
    fn timeout(self, window: Duration) -> TimedSource<Self::Item, Self::Error>
    where
        Self::Error: From<Elapsed>,
    {
        self.timeout_on(window, default_scheduler())
    }

    /// Like [`timeout`](Self::timeout), with an explicit scheduler.
    fn timeout_on(
        self,
        window: Duration,
        scheduler: Arc<dyn Scheduler>,
    ) -> TimedSource<Self::Item, Self::Error>
    where
        Self::Error: From<Elapsed>,
    {
        TimedSource {
            source: self.into_dyn(),
            scheduler,
            windows: WindowPolicy::Fixed(window),
            on_expire: synthesize_elapsed(Some(window)),
        }
    }

    /// Switches to `fallback` instead of failing when a window expires.
    /// Runs on the ambient scheduler.
    fn timeout_or(
        self,
        window: Duration,
        fallback: impl Source<Item = Self::Item, Error = Self::Error> + 'static,
    ) -> TimedSource<Self::Item, Self::Error> {
        self.timeout_or_on(window, default_scheduler(), fallback)
    }

    /// Like [`timeout_or`](Self::timeout_or), with an explicit scheduler.
    fn timeout_or_on(
        self,
        window: Duration,
        scheduler: Arc<dyn Scheduler>,
        fallback: impl Source<Item = Self::Item, Error = Self::Error> + 'static,
    ) -> TimedSource<Self::Item, Self::Error> {
        TimedSource {
            source: self.into_dyn(),
            scheduler,
            windows: WindowPolicy::Fixed(window),
            on_expire: ExpireMode::Fallback(fallback.into_dyn()),
        }
    }

    /// Per-item windows: `selector` maps each accepted value to the
    /// trigger source guarding the gap to the next one. The first window
    /// never expires. A selector error terminates downstream with that
    /// error, verbatim.
    fn timeout_items<F>(self, selector: F) -> TimedSource<Self::Item, Self::Error>
    where
        Self::Error: From<Elapsed>,
        F: Fn(&Self::Item) -> Result<DynSource<(), Self::Error>, Self::Error>
            + Send
            + Sync
            + 'static,
    {
        TimedSource {
            source: self.into_dyn(),
            scheduler: default_scheduler(),
            windows: WindowPolicy::PerItem {
                first: None,
                selector: Arc::new(selector),
            },
            on_expire: synthesize_elapsed(None),
        }
    }

    /// Like [`timeout_items`](Self::timeout_items), with `first` guarding
    /// the gap before the first value (use
    /// [`timer`](crate::source::timer) for a fixed first window).
    fn timeout_items_from<F>(
        self,
        first: impl Source<Item = (), Error = Self::Error> + 'static,
        selector: F,
    ) -> TimedSource<Self::Item, Self::Error>
    where
        Self::Error: From<Elapsed>,
        F: Fn(&Self::Item) -> Result<DynSource<(), Self::Error>, Self::Error>
            + Send
            + Sync
            + 'static,
    {
        TimedSource {
            source: self.into_dyn(),
            scheduler: default_scheduler(),
            windows: WindowPolicy::PerItem {
                first: Some(first.into_dyn()),
                selector: Arc::new(selector),
            },
            on_expire: synthesize_elapsed(None),
        }
    }

    /// Per-item windows that switch to `fallback` on expiry instead of
    /// failing.
    fn timeout_items_or<F>(
        self,
        selector: F,
        fallback: impl Source<Item = Self::Item, Error = Self::Error> + 'static,
    ) -> TimedSource<Self::Item, Self::Error>
    where
        F: Fn(&Self::Item) -> Result<DynSource<(), Self::Error>, Self::Error>
            + Send
            + Sync
            + 'static,
    {
        TimedSource {
            source: self.into_dyn(),
            scheduler: default_scheduler(),
            windows: WindowPolicy::PerItem {
                first: None,
                selector: Arc::new(selector),
            },
            on_expire: ExpireMode::Fallback(fallback.into_dyn()),
        }
    }

    /// Per-item windows with a first-window trigger and a fallback.
    fn timeout_items_from_or<F>(
        self,
        first: impl Source<Item = (), Error = Self::Error> + 'static,
        selector: F,
        fallback: impl Source<Item = Self::Item, Error = Self::Error> + 'static,
    ) -> TimedSource<Self::Item, Self::Error>
    where
        F: Fn(&Self::Item) -> Result<DynSource<(), Self::Error>, Self::Error>
            + Send
            + Sync
            + 'static,
    {
        TimedSource {
            source: self.into_dyn(),
            scheduler: default_scheduler(),
            windows: WindowPolicy::PerItem {
                first: Some(first.into_dyn()),
                selector: Arc::new(selector),
            },
            on_expire: ExpireMode::Fallback(fallback.into_dyn()),
        }
    }
}

impl<S> TimeoutExt for S
where
    S: Source + Send + Sync + 'static,
    S::Item: Send + Sync + 'static,
    S::Error: Send + Sync + 'static,
{
}
