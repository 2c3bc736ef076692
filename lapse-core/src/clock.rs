//! Time scale and clock sources.
//!
//! Lifespans are written by callers as an integer amount in a [`TimeUnit`].
//! Game ticks convert at a fixed rate of [`TICKS_PER_SECOND`], matching the
//! host scheduler's heartbeat; every other unit is plain SI duration math.
//!
//! ```text
//! amount × unit ──▶ Lifespan ──(now)──▶ Deadline::At(instant) | Deadline::Never
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{LapseError, Result};

/// Scheduler ticks per wall-clock second.
pub const TICKS_PER_SECOND: u64 = 20;

/// Milliseconds covered by one scheduler tick.
pub const MILLIS_PER_TICK: u64 = 1000 / TICKS_PER_SECOND;

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Unit a caller expresses a lifespan in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Host scheduler ticks.
    Ticks,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Convert `amount` of this unit into a [`Duration`], saturating on overflow.
    #[must_use]
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            Self::Ticks => Duration::from_millis(amount.saturating_mul(MILLIS_PER_TICK)),
            Self::Milliseconds => Duration::from_millis(amount),
            Self::Seconds => Duration::from_secs(amount),
            Self::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            Self::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
            Self::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ticks => "ticks",
            Self::Milliseconds => "milliseconds",
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Lifespan & deadline
// ---------------------------------------------------------------------------

/// How long a stored element stays observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifespan {
    /// The element never expires and is never visited by a sweep.
    #[default]
    Forever,
    /// The element expires this long after it was stored.
    Finite(Duration),
}

impl Lifespan {
    /// Build a lifespan from an amount in `unit`.
    ///
    /// A non-positive amount means "no expiration".
    #[must_use]
    pub fn of(amount: i64, unit: TimeUnit) -> Self {
        match u64::try_from(amount) {
            Ok(amount) if amount > 0 => Self::from(unit.to_duration(amount)),
            _ => Self::Forever,
        }
    }

    /// Build a lifespan that must actually expire.
    ///
    /// # Errors
    /// Returns [`LapseError::InvalidLifespan`] when `amount` is not positive.
    pub fn required(amount: i64, unit: TimeUnit) -> Result<Duration> {
        match Self::of(amount, unit) {
            Self::Finite(duration) => Ok(duration),
            Self::Forever => Err(LapseError::InvalidLifespan { amount, unit }),
        }
    }

    /// The finite duration, if any.
    #[must_use]
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::Forever => None,
            Self::Finite(d) => Some(d),
        }
    }

    /// Whether this lifespan ever ends.
    #[must_use]
    pub fn is_forever(self) -> bool {
        matches!(self, Self::Forever)
    }
}

impl From<Duration> for Lifespan {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Forever
        } else {
            Self::Finite(duration)
        }
    }
}

/// Absolute expiration point of an entry.
///
/// Ordered so that every `At` sorts before `Never`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Deadline {
    /// Expires once the clock reaches this instant.
    At(Instant),
    /// Never expires.
    Never,
}

impl Deadline {
    /// Deadline for something stored at `now` with `lifespan`.
    ///
    /// An instant too far in the future to represent is treated as `Never`.
    #[must_use]
    pub fn after(now: Instant, lifespan: Lifespan) -> Self {
        match lifespan {
            Lifespan::Forever => Self::Never,
            Lifespan::Finite(d) => now.checked_add(d).map_or(Self::Never, Self::At),
        }
    }

    /// Whether the deadline has been reached at `now` (`expires_at <= now`).
    #[must_use]
    pub fn has_passed(self, now: Instant) -> bool {
        matches!(self, Self::At(at) if at <= now)
    }

    /// The instant, if the deadline is finite.
    #[must_use]
    pub fn instant(self) -> Option<Instant> {
        match self {
            Self::At(at) => Some(at),
            Self::Never => None,
        }
    }

    /// Time left before the deadline, `None` for `Never`.
    #[must_use]
    pub fn remaining(self, now: Instant) -> Option<Duration> {
        self.instant().map(|at| at.saturating_duration_since(now))
    }
}

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Source of "now" for every timed container.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Wall-clock length of `ticks` scheduler ticks.
    fn ticks_to_duration(&self, ticks: u64) -> Duration {
        TimeUnit::Ticks.to_duration(ticks)
    }
}

/// Clock handle shared between a janitor and the containers it sweeps.
pub type SharedClock = Arc<dyn Clock>;

/// Monotonic system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.current.lock() += by;
    }

    /// Move the clock forward by a number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Move the clock forward by a number of scheduler ticks.
    pub fn advance_ticks(&self, ticks: u64) {
        self.advance(TimeUnit::Ticks.to_duration(ticks));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_fifty_millis() {
        assert_eq!(TimeUnit::Ticks.to_duration(1), Duration::from_millis(50));
        assert_eq!(TimeUnit::Ticks.to_duration(20), Duration::from_secs(1));
    }

    #[test]
    fn si_units_convert() {
        assert_eq!(TimeUnit::Minutes.to_duration(2), Duration::from_secs(120));
        assert_eq!(TimeUnit::Hours.to_duration(1), Duration::from_secs(3_600));
        assert_eq!(TimeUnit::Days.to_duration(1), Duration::from_secs(86_400));
    }

    #[test]
    fn non_positive_lifespan_is_forever() {
        assert_eq!(Lifespan::of(0, TimeUnit::Seconds), Lifespan::Forever);
        assert_eq!(Lifespan::of(-5, TimeUnit::Ticks), Lifespan::Forever);
        assert!(Lifespan::required(0, TimeUnit::Seconds).is_err());
        assert_eq!(
            Lifespan::required(3, TimeUnit::Seconds).ok(),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn deadline_passes_at_exact_instant() {
        let clock = ManualClock::new();
        let deadline = Deadline::after(clock.now(), Lifespan::of(1, TimeUnit::Seconds));

        clock.advance_millis(999);
        assert!(!deadline.has_passed(clock.now()));
        clock.advance_millis(1);
        assert!(deadline.has_passed(clock.now()));
    }

    #[test]
    fn never_sorts_last_and_never_passes() {
        let now = Instant::now();
        let finite = Deadline::At(now);
        assert!(finite < Deadline::Never);
        assert!(!Deadline::Never.has_passed(now + Duration::from_secs(1_000_000)));
        assert_eq!(Deadline::Never.remaining(now), None);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let a = ManualClock::new();
        let b = a.clone();
        a.advance_ticks(4);
        assert_eq!(a.now(), b.now());
    }
}
