//! The core push-protocol traits.
//!
//! A [`Source`] is a producer of a value sequence; an [`Observer`] is the
//! consumer seat it delivers into. The protocol is the usual push contract:
//! zero or more `on_next` calls followed by at most one terminal call
//! (`on_error` or `on_complete`), after which the producer goes silent.
//! Delivery calls are serial (a producer never overlaps its own calls) but
//! may arrive on any thread, including synchronously inside `subscribe`.
//!
//! # Cancellation
//!
//! `subscribe` returns a [`Subscription`]. Cancelling it tells the producer
//! to stop; a well-behaved producer delivers nothing after observing the
//! cancellation. Producers in this crate honor that synchronously.

use super::subscription::Subscription;
use std::sync::Arc;

/// Consumer seat for a push sequence.
///
/// Methods take `&self`: delivery can arrive from any thread, so observers
/// use interior mutability for their state.
pub trait Observer: Send + Sync {
    /// The type of values delivered.
    type Item;
    /// The type of the error terminal.
    type Error;

    /// Delivers the next value.
    fn on_next(&self, item: Self::Item);

    /// Terminates the sequence with an error. Final call.
    fn on_error(&self, error: Self::Error);

    /// Terminates the sequence normally. Final call.
    fn on_complete(&self);
}

/// A shared, type-erased observer handle.
pub type DynObserver<T, E> = Arc<dyn Observer<Item = T, Error = E>>;

/// A producer of a push sequence.
pub trait Source: Send + Sync {
    /// The type of values produced.
    type Item;
    /// The type of the error terminal.
    type Error;

    /// Starts delivery into `downstream`.
    ///
    /// May deliver synchronously before returning. The returned
    /// [`Subscription`] stops delivery when cancelled.
    fn subscribe(&self, downstream: DynObserver<Self::Item, Self::Error>) -> Subscription;
}

/// A shared, type-erased source handle.
pub type DynSource<T, E> = Arc<dyn Source<Item = T, Error = E>>;

impl<S: Source + ?Sized> Source for Arc<S> {
    type Item = S::Item;
    type Error = S::Error;

    fn subscribe(&self, downstream: DynObserver<Self::Item, Self::Error>) -> Subscription {
        (**self).subscribe(downstream)
    }
}

/// Extension methods available on every sized source.
pub trait SourceExt: Source + Sized + Send + Sync + 'static {
    /// Erases the concrete source type behind a shared handle.
    fn into_dyn(self) -> DynSource<Self::Item, Self::Error> {
        Arc::new(self)
    }
}

impl<S: Source + Sized + Send + Sync + 'static> SourceExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Sink {
        seen: Mutex<Vec<i32>>,
    }

    impl Observer for Sink {
        type Item = i32;
        type Error = &'static str;

        fn on_next(&self, item: i32) {
            self.seen.lock().push(item);
        }

        fn on_error(&self, _error: &'static str) {}

        fn on_complete(&self) {}
    }

    struct Pair;

    impl Source for Pair {
        type Item = i32;
        type Error = &'static str;

        fn subscribe(&self, downstream: DynObserver<i32, &'static str>) -> Subscription {
            downstream.on_next(1);
            downstream.on_next(2);
            downstream.on_complete();
            Subscription::new()
        }
    }

    #[test]
    fn erased_source_still_delivers() {
        let erased = Pair.into_dyn();
        let sink = Arc::new(Sink {
            seen: Mutex::new(Vec::new()),
        });
        let _sub = erased.subscribe(sink.clone());
        assert_eq!(*sink.seen.lock(), vec![1, 2]);
    }
}
