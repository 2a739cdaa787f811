//! Monotonic time points shared by real and virtual clocks.
//!
//! [`Time`] is a nanosecond offset from a clock's origin. The real-clock
//! scheduler measures it from its own start instant; the virtual scheduler
//! starts at [`Time::ZERO`] and only moves when the test driver advances it.
//! All arithmetic saturates so deadline math near the representable limit
//! cannot wrap.

use core::fmt;
use std::time::Duration;

/// Converts a [`Duration`] to nanoseconds, saturating at `u64::MAX`.
#[must_use]
pub(crate) fn duration_to_nanos(duration: Duration) -> u64 {
    duration.as_nanos().min(u128::from(u64::MAX)) as u64
}

/// A point in time, in nanoseconds since the owning clock's origin.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(u64);

impl Time {
    /// The clock origin.
    pub const ZERO: Self = Self(0);

    /// The latest representable time point.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a time point from nanoseconds since the origin.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a time point from milliseconds since the origin.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Creates a time point from seconds since the origin.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Returns the offset from the origin in nanoseconds.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns this time point advanced by `nanos`, saturating at [`Time::MAX`].
    #[must_use]
    pub const fn saturating_add_nanos(self, nanos: u64) -> Self {
        Self(self.0.saturating_add(nanos))
    }

    /// Returns this time point advanced by `duration`, saturating at [`Time::MAX`].
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        self.saturating_add_nanos(duration_to_nanos(duration))
    }

    /// Returns the duration from `earlier` to `self`, or [`Duration::ZERO`]
    /// if `earlier` is not actually earlier.
    #[must_use]
    pub fn saturating_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({}ns)", self.0)
    }
}
