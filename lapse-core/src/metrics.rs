//! Sweep instrumentation.
//!
//! Lock-free counters incremented by the janitor on every pass, plus a
//! Prometheus text export for server dashboards. All sweep work also emits
//! `tracing` events under the span names in [`spans`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Atomic counters for janitor activity.
pub struct SweepCounters {
    /// Janitor passes completed.
    pub passes: AtomicU64,
    /// Container sweeps performed across all passes.
    pub containers_swept: AtomicU64,
    /// Entries physically removed because their lifespan ended.
    pub entries_expired: AtomicU64,
    /// Containers dropped from the registry (gone or disposed).
    pub containers_released: AtomicU64,
    /// Expiry listener invocations that panicked.
    pub listener_panics: AtomicU64,
    /// Duration of the most recent pass in microseconds.
    pub last_pass_us: AtomicU64,
}

impl SweepCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            passes: AtomicU64::new(0),
            containers_swept: AtomicU64::new(0),
            entries_expired: AtomicU64::new(0),
            containers_released: AtomicU64::new(0),
            listener_panics: AtomicU64::new(0),
            last_pass_us: AtomicU64::new(0),
        }
    }

    /// Start timing a pass; the elapsed time is stored when the guard drops.
    #[must_use]
    pub fn time_pass(&self) -> SweepTimer<'_> {
        SweepTimer {
            counters: self,
            start: Instant::now(),
        }
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            containers_swept: self.containers_swept.load(Ordering::Relaxed),
            entries_expired: self.entries_expired.load(Ordering::Relaxed),
            containers_released: self.containers_released.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
            last_pass_us: self.last_pass_us.load(Ordering::Relaxed),
        }
    }
}

impl Default for SweepCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that records the pass duration when dropped.
pub struct SweepTimer<'a> {
    counters: &'a SweepCounters,
    start: Instant,
}

impl Drop for SweepTimer<'_> {
    fn drop(&mut self) {
        let us = u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.counters.last_pass_us.store(us, Ordering::Relaxed);
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Janitor passes completed.
    pub passes: u64,
    /// Container sweeps performed.
    pub containers_swept: u64,
    /// Entries removed by lifespan end.
    pub entries_expired: u64,
    /// Containers released from the registry.
    pub containers_released: u64,
    /// Listener panics caught.
    pub listener_panics: u64,
    /// Last pass duration (μs).
    pub last_pass_us: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP lapse_janitor_passes_total Janitor passes completed\n\
             # TYPE lapse_janitor_passes_total counter\n\
             lapse_janitor_passes_total {}\n\
             # HELP lapse_containers_swept_total Container sweeps performed\n\
             # TYPE lapse_containers_swept_total counter\n\
             lapse_containers_swept_total {}\n\
             # HELP lapse_entries_expired_total Entries removed at lifespan end\n\
             # TYPE lapse_entries_expired_total counter\n\
             lapse_entries_expired_total {}\n\
             # HELP lapse_containers_released_total Containers dropped from the janitor\n\
             # TYPE lapse_containers_released_total counter\n\
             lapse_containers_released_total {}\n\
             # HELP lapse_listener_panics_total Expiry listeners that panicked\n\
             # TYPE lapse_listener_panics_total counter\n\
             lapse_listener_panics_total {}\n\
             # HELP lapse_last_pass_microseconds Duration of the last janitor pass\n\
             # TYPE lapse_last_pass_microseconds gauge\n\
             lapse_last_pass_microseconds {}\n",
            self.passes,
            self.containers_swept,
            self.entries_expired,
            self.containers_released,
            self.listener_panics,
            self.last_pass_us,
        )
    }
}

// ---------------------------------------------------------------------------
// Tracing Span Names
// ---------------------------------------------------------------------------

/// Span names used with `tracing::span!`.
pub mod spans {
    /// One janitor pass over every tracked container.
    pub const JANITOR_PASS: &str = "lapse::janitor::pass";
    /// Sweep of a single container.
    pub const CONTAINER_SWEEP: &str = "lapse::container::sweep";
    /// Matching an incoming message against pending requests.
    pub const RESPONSE_MATCH: &str = "lapse::respond::match";
    /// One host scheduler tick.
    pub const HOST_TICK: &str = "lapse::host::tick";
}
