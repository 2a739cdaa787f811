//! Concatenation of two sources.
//!
//! [`chain`] relays the first source until it completes, then subscribes
//! the second and relays it. An error from the first source terminates the
//! chain without touching the second. This is the minimal concatenation
//! the timeout tests need (e.g. a finite prefix followed by `never()`).

use super::source::{DynObserver, DynSource, Observer, Source, SourceExt};
use super::subscription::{Subscription, SubscriptionSlot};

/// Creates a source that delivers `first` to completion, then `second`.
#[must_use]
pub fn chain<T, E>(
    first: impl Source<Item = T, Error = E> + 'static,
    second: impl Source<Item = T, Error = E> + 'static,
) -> Chain<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    Chain {
        first: first.into_dyn(),
        second: second.into_dyn(),
    }
}

/// Source returned by [`chain`].
pub struct Chain<T, E> {
    first: DynSource<T, E>,
    second: DynSource<T, E>,
}

impl<T, E> Source for Chain<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, downstream: DynObserver<T, E>) -> Subscription {
        let root = Subscription::new();
        let first_slot = SubscriptionSlot::new();
        let second_slot = SubscriptionSlot::new();
        {
            let first_slot = first_slot.clone();
            let second_slot = second_slot.clone();
            root.on_cancel(move || {
                first_slot.cancel();
                second_slot.cancel();
            });
        }

        let bridge = std::sync::Arc::new(Bridge {
            downstream,
            second: self.second.clone(),
            first_slot: first_slot.clone(),
            second_slot,
        });
        first_slot.set(self.first.subscribe(bridge));
        root
    }
}

/// Relays the first source and performs the handover on completion.
struct Bridge<T, E> {
    downstream: DynObserver<T, E>,
    second: DynSource<T, E>,
    first_slot: SubscriptionSlot,
    second_slot: SubscriptionSlot,
}

impl<T, E> Observer for Bridge<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn on_next(&self, item: T) {
        self.downstream.on_next(item);
    }

    fn on_error(&self, error: E) {
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        self.first_slot.cancel();
        if self.second_slot.is_cancelled() {
            return;
        }
        tracing::trace!("chain handover to second source");
        self.second_slot
            .set(self.second.subscribe(self.downstream.clone()));
    }
}
