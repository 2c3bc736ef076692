//! Game time measured in scheduler ticks.
//!
//! A [`TickClock`] only moves when the [`TickScheduler`](crate::TickScheduler)
//! advances it, so lifespans follow the simulation rather than the wall
//! clock: a server that stalls for a second does not expire a second's worth
//! of entries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lapse_core::{Clock, TimeUnit};

/// Clock whose "now" is `origin + ticks × tick length`.
#[derive(Debug)]
pub struct TickClock {
    origin: Instant,
    tick: AtomicU64,
}

impl TickClock {
    /// Create a clock at tick zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            tick: AtomicU64::new(0),
        }
    }

    /// Ticks elapsed since creation.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    /// Step forward one tick and return the new tick number.
    pub(crate) fn advance(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Game time elapsed since tick zero.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        TimeUnit::Ticks.to_duration(self.current_tick())
    }

    /// The current tick paired with the wall-clock time it was observed.
    #[must_use]
    pub fn stamp(&self) -> TickStamp {
        TickStamp::now(self.current_tick())
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TickClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

/// A tick number with the wall-clock time it corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TickStamp {
    /// Scheduler tick (monotonically increasing).
    pub tick: u64,
    /// Wall-clock time the tick was observed, for logs and save metadata.
    pub real_time: DateTime<Utc>,
}

impl TickStamp {
    /// Stamp `tick` with the current wall-clock time.
    #[must_use]
    pub fn now(tick: u64) -> Self {
        Self {
            tick,
            real_time: Utc::now(),
        }
    }

    /// Ticks elapsed since `earlier`, zero if `earlier` is actually later.
    #[must_use]
    pub fn ticks_since(&self, earlier: &Self) -> u64 {
        self.tick.saturating_sub(earlier.tick)
    }

    /// Game time elapsed since `earlier`.
    #[must_use]
    pub fn game_time_since(&self, earlier: &Self) -> Duration {
        TimeUnit::Ticks.to_duration(self.ticks_since(earlier))
    }
}
