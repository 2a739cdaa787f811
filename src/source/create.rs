//! Ad-hoc sources from a subscribe closure.
//!
//! [`create`] is the escape hatch for producers that do not fit a canned
//! shape: the closure receives the downstream observer and the
//! subscription being handed back, and may deliver synchronously, attach
//! cleanup via [`Subscription::on_cancel`], or hand the observer off to
//! another thread.

use super::source::{DynObserver, Source};
use super::subscription::Subscription;
use std::marker::PhantomData;

/// Creates a source from a subscribe closure.
///
/// The closure runs once per subscription. It must honor the push
/// contract: serial delivery, at most one terminal event, silence after
/// the returned subscription is cancelled.
#[must_use]
pub fn create<T, E, F>(on_subscribe: F) -> Create<F, T, E>
where
    F: Fn(DynObserver<T, E>, &Subscription) + Send + Sync,
{
    Create {
        on_subscribe,
        _marker: PhantomData,
    }
}

/// Source returned by [`create`].
#[derive(Debug, Clone)]
pub struct Create<F, T, E> {
    on_subscribe: F,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E, F> Source for Create<F, T, E>
where
    F: Fn(DynObserver<T, E>, &Subscription) + Send + Sync,
    T: Send + Sync,
    E: Send + Sync,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, downstream: DynObserver<T, E>) -> Subscription {
        let sub = Subscription::new();
        (self.on_subscribe)(downstream, &sub);
        sub
    }
}
