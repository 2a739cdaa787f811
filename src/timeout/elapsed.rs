//! The timeout error value.

use core::fmt;
use std::time::Duration;

/// Error delivered downstream when a timeout window expires and no
/// fallback source is configured.
///
/// Carries the index of the window that expired (window 0 is the one
/// opened at subscription) and, for fixed-duration timeouts, the
/// configured window length.
///
/// # Example
///
/// ```
/// use vigil::timeout::Elapsed;
/// use std::time::Duration;
///
/// let elapsed = Elapsed::new(2, Some(Duration::from_secs(3)));
/// assert_eq!(elapsed.window(), 2);
/// assert_eq!(elapsed.after(), Some(Duration::from_secs(3)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    window: u64,
    after: Option<Duration>,
}

impl Elapsed {
    /// Creates a new `Elapsed` for the given window.
    #[must_use]
    pub const fn new(window: u64, after: Option<Duration>) -> Self {
        Self { window, after }
    }

    /// Returns the index of the window that expired.
    #[must_use]
    pub const fn window(&self) -> u64 {
        self.window
    }

    /// Returns the configured window length, when the timeout used a
    /// fixed duration.
    #[must_use]
    pub const fn after(&self) -> Option<Duration> {
        self.after
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.after {
            Some(after) => write!(f, "timeout window {} elapsed after {:?}", self.window, after),
            None => write!(f, "timeout window {} elapsed", self.window),
        }
    }
}

impl std::error::Error for Elapsed {}
