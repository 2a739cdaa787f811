//! Sources backed by plain iterators.
//!
//! [`iter`] delivers every item synchronously during `subscribe`, then
//! completes. [`just`] is the single-item special case. Cancellation is
//! checked between items, so a downstream that cancels mid-delivery stops
//! the remainder.

use super::source::{DynObserver, Source};
use super::subscription::Subscription;
use std::marker::PhantomData;

/// Creates a source that emits each item of `items`, then completes.
///
/// The iterator is cloned per subscription, so the source can be
/// subscribed more than once.
#[must_use]
pub fn iter<I, E>(items: I) -> Iter<I, E>
where
    I: IntoIterator + Clone + Send + Sync,
{
    Iter {
        items,
        _error: PhantomData,
    }
}

/// Creates a source that emits `value` once, then completes.
#[must_use]
pub fn just<T, E>(value: T) -> Iter<[T; 1], E>
where
    T: Clone + Send + Sync,
{
    iter([value])
}

/// Source returned by [`iter`] and [`just`].
#[derive(Debug, Clone)]
pub struct Iter<I, E> {
    items: I,
    _error: PhantomData<fn() -> E>,
}

impl<I, E> Source for Iter<I, E>
where
    I: IntoIterator + Clone + Send + Sync,
    I::Item: Send,
{
    type Item = I::Item;
    type Error = E;

    fn subscribe(&self, downstream: DynObserver<Self::Item, E>) -> Subscription {
        let sub = Subscription::new();
        for item in self.items.clone() {
            if sub.is_cancelled() {
                return sub;
            }
            downstream.on_next(item);
        }
        if !sub.is_cancelled() {
            downstream.on_complete();
        }
        sub
    }
}
