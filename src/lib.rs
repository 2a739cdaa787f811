//! Quiescence deadlines for push-based streams.
//!
//! `vigil` watches a push sequence and enforces a maximum quiet interval:
//! if no value arrives within the current window, the sequence either
//! fails with [`timeout::Elapsed`] or switches to a fallback source. The
//! arbitration between "value arrived" and "window expired" is a single
//! compare-and-set on a window epoch, so the outcome is exact under true
//! concurrency between the producer, the timer thread, and a cancelling
//! downstream: no double delivery, no lost cancellation.
//!
//! # Modules
//!
//! - [`source`]: the push protocol ([`source::Source`] /
//!   [`source::Observer`]), cancellation handles, and producer helpers
//! - [`scheduler`]: delayed-task execution on a real or virtual clock
//! - [`timeout`]: the timeout operator and its entry points
//! - [`time`]: the time point shared by both clocks
//!
//! # Example
//!
//! ```ignore
//! use vigil::prelude::*;
//! use std::time::Duration;
//!
//! let readings = telemetry_source()
//!     .timeout(Duration::from_secs(3));
//! let sub = readings.subscribe(my_observer);
//! // ... later:
//! sub.cancel();
//! ```
//!
//! # Deterministic testing
//!
//! Timing behavior is testable without sleeping: hand the operator a
//! [`scheduler::VirtualScheduler`] and drive it with
//! [`advance_by`](scheduler::VirtualScheduler::advance_by).

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod scheduler;
pub mod source;
pub mod time;
pub mod timeout;

/// The common imports: protocol traits, cancellation handles, and the
/// timeout entry points.
pub mod prelude {
    pub use crate::scheduler::{default_scheduler, Scheduler};
    pub use crate::source::{Observer, Source, SourceExt, Subscription};
    pub use crate::time::Time;
    pub use crate::timeout::{Elapsed, TimeoutExt};
}
