//! Delivery coordination for the timeout operator.
//!
//! A [`TimeoutCoordinator`] sits between one producer and one downstream
//! observer. Producer events and trigger expiries both funnel through the
//! controller's claims, so every downstream call is made by a party that
//! won its window. That single gate is what serializes delivery and
//! guarantees at most one terminal signal, even with the producer, the
//! scheduler's timer thread, and a cancelling downstream all active at
//! once.
//!
//! On a won expiry the coordinator either fails downstream or performs
//! the fallback switch: cancel the primary, subscribe the fallback, and
//! from then on relay the fallback verbatim. The controller plays no
//! further role, and the fallback is trusted to terminate on its own.

use super::controller::TimeoutController;
use crate::scheduler::Scheduler;
use crate::source::{DynObserver, DynSource, Observer, Subscription, SubscriptionSlot};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Which upstream is currently feeding the downstream.
///
/// Transitions are one-directional and only ever executed by a
/// claim-winning path or by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Branch {
    /// The primary producer is live.
    Primary = 0,
    /// An expiry claim won and the fallback subscription is being set up.
    SwitchingToFallback = 1,
    /// The fallback producer is live.
    Fallback = 2,
    /// A terminal signal has been delivered or the downstream cancelled.
    Terminated = 3,
}

impl Branch {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Primary,
            1 => Self::SwitchingToFallback,
            2 => Self::Fallback,
            _ => Self::Terminated,
        }
    }
}

/// The per-subscription selector: maps the last accepted value to the
/// trigger source for the next window.
pub(crate) type SelectorFn<T, E> = Arc<dyn Fn(&T) -> Result<DynSource<(), E>, E> + Send + Sync>;

/// How each window obtains its expiry trigger.
pub(crate) enum WindowPolicy<T, E> {
    /// Every window is a fixed quiet interval on the scheduler.
    Fixed(Duration),
    /// Window 0 comes from `first` (or never expires when `None`); every
    /// later window's trigger is produced by the selector from the value
    /// that opened it.
    PerItem {
        first: Option<DynSource<(), E>>,
        selector: SelectorFn<T, E>,
    },
}

impl<T, E> Clone for WindowPolicy<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Fixed(duration) => Self::Fixed(*duration),
            Self::PerItem { first, selector } => Self::PerItem {
                first: first.clone(),
                selector: Arc::clone(selector),
            },
        }
    }
}

/// What a won expiry claim does to the downstream.
pub(crate) enum ExpireMode<T, E> {
    /// Synthesize a timeout error for the expired window.
    Error(Arc<dyn Fn(u64) -> E + Send + Sync>),
    /// Switch delivery to this fallback source.
    Fallback(DynSource<T, E>),
}

impl<T, E> Clone for ExpireMode<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Error(make) => Self::Error(Arc::clone(make)),
            Self::Fallback(source) => Self::Fallback(Arc::clone(source)),
        }
    }
}

/// Per-subscription state tying controller claims to delivery.
pub(crate) struct TimeoutCoordinator<T, E> {
    downstream: DynObserver<T, E>,
    controller: TimeoutController,
    scheduler: Arc<dyn Scheduler>,
    windows: WindowPolicy<T, E>,
    on_expire: ExpireMode<T, E>,
    branch: AtomicU8,
    primary: SubscriptionSlot,
    fallback: SubscriptionSlot,
}

impl<T, E> TimeoutCoordinator<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Wires a coordinator between `source` and `downstream` and starts
    /// delivery.
    ///
    /// Window 0 is armed before the primary subscription is made, so a
    /// producer that stays silent from the start is still timed. The
    /// primary handle is attached through a slot: if the subscription
    /// call itself resolved the race (immediate terminal, or an expiry
    /// that already switched branches), the slot is closed by then and
    /// the handle is cancelled on arrival.
    pub(crate) fn subscribe(
        source: &DynSource<T, E>,
        downstream: DynObserver<T, E>,
        scheduler: Arc<dyn Scheduler>,
        windows: WindowPolicy<T, E>,
        on_expire: ExpireMode<T, E>,
    ) -> Subscription {
        let coordinator = Arc::new(Self {
            downstream,
            controller: TimeoutController::new(),
            scheduler,
            windows,
            on_expire,
            branch: AtomicU8::new(Branch::Primary as u8),
            primary: SubscriptionSlot::new(),
            fallback: SubscriptionSlot::new(),
        });

        let root = Subscription::new();
        {
            let coordinator = Arc::clone(&coordinator);
            root.on_cancel(move || coordinator.release_all());
        }

        coordinator.arm_first();
        let upstream = source.subscribe(Arc::new(PrimaryObserver {
            coordinator: Arc::clone(&coordinator),
        }));
        coordinator.primary.set(upstream);
        root
    }

    fn branch(&self) -> Branch {
        Branch::from_u8(self.branch.load(Ordering::Acquire))
    }

    /// Downstream cancellation: release every live resource synchronously.
    fn release_all(&self) {
        self.branch
            .store(Branch::Terminated as u8, Ordering::Release);
        self.controller.close();
        self.primary.cancel();
        self.fallback.cancel();
    }

    fn arm_first(self: &Arc<Self>) {
        match &self.windows {
            WindowPolicy::Fixed(duration) => self.arm_timer(0, *duration),
            WindowPolicy::PerItem { first, .. } => {
                if let Some(trigger) = first {
                    self.arm_trigger(0, trigger);
                }
                // No first trigger: window 0 never expires.
            }
        }
    }

    fn arm_timer(self: &Arc<Self>, window: u64, duration: Duration) {
        let coordinator = Arc::clone(self);
        let handle = self
            .scheduler
            .schedule_once(duration, Box::new(move || coordinator.expire(window)));
        self.controller.arm(handle);
    }

    fn arm_trigger(self: &Arc<Self>, window: u64, trigger: &DynSource<(), E>) {
        let observer = Arc::new(TriggerObserver {
            coordinator: Arc::clone(self),
            window,
            fired: AtomicBool::new(false),
        });
        self.controller.arm(trigger.subscribe(observer));
    }

    /// A trigger fired for `window`: arbitrate, then fail or switch.
    fn expire(self: &Arc<Self>, window: u64) {
        if !self.controller.expire(window) {
            tracing::trace!(window, "expiry lost its window claim");
            return;
        }
        self.primary.cancel();
        match &self.on_expire {
            ExpireMode::Error(make) => {
                tracing::debug!(window, "window expired, failing downstream");
                self.branch
                    .store(Branch::Terminated as u8, Ordering::Release);
                self.controller.close();
                self.downstream.on_error(make.as_ref()(window));
            }
            ExpireMode::Fallback(fallback) => {
                tracing::debug!(window, "window expired, switching to fallback");
                self.branch
                    .store(Branch::SwitchingToFallback as u8, Ordering::Release);
                self.controller.close();
                let observer = Arc::new(FallbackObserver {
                    coordinator: Arc::clone(self),
                });
                self.fallback.set(fallback.subscribe(observer));
                // The fallback may have terminated (or the downstream
                // cancelled) during that subscribe call; only a still-
                // switching coordinator settles into Fallback.
                let _ = self.branch.compare_exchange(
                    Branch::SwitchingToFallback as u8,
                    Branch::Fallback as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }
        }
    }

    /// Terminal path for the primary branch; caller must have won a claim.
    fn finish_primary(&self, deliver: impl FnOnce(&DynObserver<T, E>)) {
        self.branch
            .store(Branch::Terminated as u8, Ordering::Release);
        self.controller.close();
        self.primary.cancel();
        deliver(&self.downstream);
    }

    /// Claims the terminal position for the fallback branch.
    fn seal_fallback(&self) -> bool {
        let prior = self
            .branch
            .swap(Branch::Terminated as u8, Ordering::AcqRel);
        if Branch::from_u8(prior) == Branch::Terminated {
            return false;
        }
        self.fallback.cancel();
        true
    }
}

/// Observer seat subscribed to the primary producer.
struct PrimaryObserver<T, E> {
    coordinator: Arc<TimeoutCoordinator<T, E>>,
}

impl<T, E> Observer for PrimaryObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn on_next(&self, item: T) {
        let coordinator = &self.coordinator;
        let Some(window) = coordinator.controller.advance() else {
            // An expiry already owns this window; dropping the value here
            // is the expected resolution of the race, not an error.
            tracing::trace!("value lost its window claim, dropped");
            return;
        };
        match &coordinator.windows {
            WindowPolicy::Fixed(duration) => {
                let duration = *duration;
                coordinator.downstream.on_next(item);
                coordinator.arm_timer(window, duration);
            }
            WindowPolicy::PerItem { selector, .. } => {
                // Invoked on the claim-winning thread; the trigger is not
                // subscribed until after the value is forwarded, so a
                // synchronously-firing trigger cannot overtake its value.
                let next_trigger = selector.as_ref()(&item);
                coordinator.downstream.on_next(item);
                match next_trigger {
                    Ok(trigger) => coordinator.arm_trigger(window, &trigger),
                    Err(error) => {
                        // Selector failure short-circuits the window as a
                        // plain downstream error.
                        if coordinator.controller.finish() {
                            coordinator.finish_primary(|downstream| downstream.on_error(error));
                        }
                    }
                }
            }
        }
    }

    fn on_error(&self, error: E) {
        if self.coordinator.controller.finish() {
            self.coordinator
                .finish_primary(|downstream| downstream.on_error(error));
        }
    }

    fn on_complete(&self) {
        if self.coordinator.controller.finish() {
            self.coordinator
                .finish_primary(|downstream| downstream.on_complete());
        }
    }
}

/// Observer seat subscribed to the fallback producer after a switch.
///
/// Relays unconditionally: the fallback's output fully determines
/// downstream behavior, and its terminal events are forwarded verbatim,
/// never reclassified as timeouts.
struct FallbackObserver<T, E> {
    coordinator: Arc<TimeoutCoordinator<T, E>>,
}

impl<T, E> Observer for FallbackObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn on_next(&self, item: T) {
        if self.coordinator.branch() != Branch::Terminated {
            self.coordinator.downstream.on_next(item);
        }
    }

    fn on_error(&self, error: E) {
        if self.coordinator.seal_fallback() {
            self.coordinator.downstream.on_error(error);
        }
    }

    fn on_complete(&self) {
        if self.coordinator.seal_fallback() {
            self.coordinator.downstream.on_complete();
        }
    }
}

/// Observer seat subscribed to one window's trigger source.
///
/// The first event of any kind fires the window; everything after the
/// first is ignored.
struct TriggerObserver<T, E> {
    coordinator: Arc<TimeoutCoordinator<T, E>>,
    window: u64,
    fired: AtomicBool,
}

impl<T, E> TriggerObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn fire(&self) {
        if !self.fired.swap(true, Ordering::AcqRel) {
            self.coordinator.expire(self.window);
        }
    }
}

impl<T, E> Observer for TriggerObserver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Item = ();
    type Error = E;

    fn on_next(&self, (): ()) {
        self.fire();
    }

    fn on_error(&self, _error: E) {
        self.fire();
    }

    fn on_complete(&self) {
        self.fire();
    }
}
