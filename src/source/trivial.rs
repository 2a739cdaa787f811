//! Fixed-outcome sources: [`never`], [`empty`], and [`fail`].
//!
//! These carry no data of their own and are mostly useful as timeout
//! triggers and fallbacks: `never()` keeps a window open forever,
//! `empty()` fires it instantly, `fail(e)` is a fallback that errors on
//! arrival.

use super::source::{DynObserver, Source};
use super::subscription::Subscription;
use std::marker::PhantomData;

/// Creates a source that emits nothing and never terminates.
#[must_use]
pub fn never<T, E>() -> Never<T, E> {
    Never {
        _marker: PhantomData,
    }
}

/// Creates a source that completes immediately with no values.
#[must_use]
pub fn empty<T, E>() -> Empty<T, E> {
    Empty {
        _marker: PhantomData,
    }
}

/// Creates a source that errors immediately with a clone of `error`.
#[must_use]
pub fn fail<T, E>(error: E) -> Fail<T, E>
where
    E: Clone + Send + Sync,
{
    Fail {
        error,
        _item: PhantomData,
    }
}

/// Source returned by [`never`].
#[derive(Debug, Clone)]
pub struct Never<T, E> {
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> Source for Never<T, E> {
    type Item = T;
    type Error = E;

    fn subscribe(&self, _downstream: DynObserver<T, E>) -> Subscription {
        Subscription::new()
    }
}

/// Source returned by [`empty`].
#[derive(Debug, Clone)]
pub struct Empty<T, E> {
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> Source for Empty<T, E> {
    type Item = T;
    type Error = E;

    fn subscribe(&self, downstream: DynObserver<T, E>) -> Subscription {
        downstream.on_complete();
        Subscription::new()
    }
}

/// Source returned by [`fail`].
#[derive(Debug, Clone)]
pub struct Fail<T, E> {
    error: E,
    _item: PhantomData<fn() -> T>,
}

impl<T, E> Source for Fail<T, E>
where
    E: Clone + Send + Sync,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, downstream: DynObserver<T, E>) -> Subscription {
        downstream.on_error(self.error.clone());
        Subscription::new()
    }
}
