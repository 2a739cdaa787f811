//! Push-based value sequences.
//!
//! This module provides the producer/consumer seam the operators in this
//! crate are built on:
//!
//! - [`Source`] / [`Observer`]: the push protocol (zero or more values,
//!   at most one terminal event, silence after cancellation)
//! - [`Subscription`] / [`SubscriptionSlot`]: composite and serial
//!   cancellation handles
//! - producers: [`iter`], [`just`], [`never`], [`empty`], [`fail`],
//!   [`chain`], [`timer`], [`create`], and the multicast [`Subject`]
//!
//! # Examples
//!
//! ```ignore
//! use vigil::source::{iter, Source};
//!
//! let source = iter::<_, MyError>(vec![1, 2, 3]);
//! // subscribing delivers 1, 2, 3, then the completion
//! ```

mod chain;
mod create;
mod iter;
#[allow(clippy::module_inception)]
mod source;
mod subject;
mod subscription;
mod timer;
mod trivial;

pub use chain::{chain, Chain};
pub use create::{create, Create};
pub use iter::{iter, just, Iter};
pub use source::{DynObserver, DynSource, Observer, Source, SourceExt};
pub use subject::Subject;
pub use subscription::{Subscription, SubscriptionSlot};
pub use timer::{timer, Timer};
pub use trivial::{empty, fail, never, Empty, Fail, Never};
