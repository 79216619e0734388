//! Frame clock and absolute deadlines.
//!
//! Every timer in the combat core is an absolute [`Deadline`] compared against
//! a single [`Millis`] timestamp read once at the top of each tick.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Monotonic timestamp in milliseconds since the clock's origin.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Millis(pub u64);

impl Millis {
    /// The clock origin.
    pub const ZERO: Self = Self(0);

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns this timestamp moved forward by `ms`.
    #[must_use]
    pub const fn plus(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is later).
    #[must_use]
    pub const fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::fmt::Display for Millis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// An optional absolute deadline.
///
/// An unset deadline is never active; a set one is active while
/// `now < deadline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Deadline(Option<Millis>);

impl Deadline {
    /// A deadline that is not set.
    pub const UNSET: Self = Self(None);

    /// Creates a deadline at `at`.
    #[must_use]
    pub const fn at(at: Millis) -> Self {
        Self(Some(at))
    }

    /// The stored deadline, if set.
    #[must_use]
    pub const fn get(self) -> Option<Millis> {
        self.0
    }

    /// Returns true if the deadline has been set at some point.
    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0.is_some()
    }

    /// Returns true while `now` is before the deadline.
    #[must_use]
    pub fn is_active(self, now: Millis) -> bool {
        self.0.is_some_and(|at| now < at)
    }

    /// Sets the deadline to `now + duration_ms`, replacing any previous value.
    pub fn start(&mut self, now: Millis, duration_ms: u64) {
        self.0 = Some(now.plus(duration_ms));
    }

    /// Extends the deadline to `max(current, now + duration_ms)`.
    ///
    /// An overlapping shorter window never shortens an existing one.
    pub fn extend(&mut self, now: Millis, duration_ms: u64) {
        let candidate = now.plus(duration_ms);
        self.0 = Some(match self.0 {
            Some(current) => current.max(candidate),
            None => candidate,
        });
    }

    /// Clears the deadline.
    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// Moves a set deadline forward by `ms` (used when resuming from pause).
    pub fn shift(&mut self, ms: u64) {
        if let Some(at) = self.0 {
            self.0 = Some(at.plus(ms));
        }
    }
}

/// Source of tick timestamps.
pub trait FrameClock {
    /// Reads the current time.
    fn now(&self) -> Millis;
}

/// Wall-clock source backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Creates a clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl FrameClock for SystemClock {
    fn now(&self) -> Millis {
        Millis(self.origin.elapsed().as_millis() as u64)
    }
}

/// Manually advanced clock for tests and headless simulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    now: Millis,
}

impl ManualClock {
    /// Creates a clock starting at `start`.
    #[must_use]
    pub const fn starting_at(start: Millis) -> Self {
        Self { now: start }
    }

    /// Advances the clock by `ms`.
    pub fn advance(&mut self, ms: u64) {
        self.now = self.now.plus(ms);
    }

    /// Jumps the clock to `at` if it is later than the current time.
    pub fn set(&mut self, at: Millis) {
        self.now = self.now.max(at);
    }
}

impl FrameClock for ManualClock {
    fn now(&self) -> Millis {
        self.now
    }
}
