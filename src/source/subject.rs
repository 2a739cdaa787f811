//! A multicast push relay.
//!
//! A [`Subject`] is both a producer handle and a [`Source`]: callers push
//! values through [`next`](Subject::next) / [`error`](Subject::error) /
//! [`complete`](Subject::complete), and every currently-subscribed
//! observer receives them. Late subscribers to a terminated subject
//! receive the terminal event immediately. Unsubscribing removes the
//! observer synchronously, so values pushed afterwards are not delivered
//! to it.
//!
//! The observer list lives under a mutex; delivery snapshots the list and
//! runs outside the lock so an observer may unsubscribe (or resubscribe)
//! from inside a callback without deadlocking.

use super::source::{DynObserver, Observer, Source};
use super::subscription::Subscription;
use parking_lot::Mutex;
use std::sync::Arc;

enum State<T, E> {
    Open {
        seats: Vec<(u64, DynObserver<T, E>)>,
        next_key: u64,
    },
    Completed,
    Failed(E),
}

/// A shared push relay. Cloning shares the same observer list.
pub struct Subject<T, E> {
    state: Arc<Mutex<State<T, E>>>,
}

impl<T, E> Clone for Subject<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T, E> Subject<T, E> {
    /// Creates a new, open subject with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::Open {
                seats: Vec::new(),
                next_key: 0,
            })),
        }
    }

    /// Returns the number of currently-subscribed observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        match &*self.state.lock() {
            State::Open { seats, .. } => seats.len(),
            _ => 0,
        }
    }

    fn snapshot(&self) -> Vec<DynObserver<T, E>> {
        match &*self.state.lock() {
            State::Open { seats, .. } => seats.iter().map(|(_, obs)| Arc::clone(obs)).collect(),
            _ => Vec::new(),
        }
    }

    fn terminate(&self, terminal: State<T, E>) -> Vec<DynObserver<T, E>> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, terminal) {
            State::Open { seats, .. } => seats.into_iter().map(|(_, obs)| obs).collect(),
            // Already terminated: restore and deliver to nobody.
            prior => {
                *state = prior;
                Vec::new()
            }
        }
    }
}

impl<T: Clone, E> Subject<T, E> {
    /// Pushes a value to every current subscriber.
    ///
    /// Ignored after the subject has terminated.
    pub fn next(&self, item: T) {
        for obs in self.snapshot() {
            obs.on_next(item.clone());
        }
    }
}

impl<T, E> Subject<T, E> {
    /// Terminates the subject with `error`, delivering it to every current
    /// subscriber and replaying it to late ones.
    pub fn error(&self, error: E)
    where
        E: Clone,
    {
        let seats = self.terminate(State::Failed(error.clone()));
        for obs in seats {
            obs.on_error(error.clone());
        }
    }

    /// Completes the subject, delivering the completion to every current
    /// subscriber and replaying it to late ones.
    pub fn complete(&self) {
        for obs in self.terminate(State::Completed) {
            obs.on_complete();
        }
    }
}

impl<T, E> Default for Subject<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Source for Subject<T, E>
where
    T: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, downstream: DynObserver<T, E>) -> Subscription {
        let replay = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Open { seats, next_key } => {
                    let key = *next_key;
                    *next_key += 1;
                    seats.push((key, downstream));

                    let registry = Arc::clone(&self.state);
                    return Subscription::from_action(move || {
                        if let State::Open { seats, .. } = &mut *registry.lock() {
                            seats.retain(|(k, _)| *k != key);
                        }
                    });
                }
                State::Completed => None,
                State::Failed(error) => Some(error.clone()),
            }
        };
        match replay {
            Some(error) => downstream.on_error(error),
            None => downstream.on_complete(),
        }
        Subscription::new()
    }
}
