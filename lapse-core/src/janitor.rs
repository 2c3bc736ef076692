//! The janitor: periodic physical removal of expired entries.
//!
//! Containers enforce expiry lazily on every read, so correctness never
//! depends on the janitor. The janitor bounds memory: once per interval it
//! visits every tracked container, removes what has expired, and lets the
//! containers notify their lifespan-end listeners.
//!
//! ```text
//!   host heartbeat ──every N ticks──▶ Janitor::sweep_now()
//!                                        │
//!        ┌───────────────┬───────────────┼───────────────┐
//!        ▼               ▼               ▼               ▼
//!    TimedMap        TimedSet       TimedMultimap     (dropped → released)
//! ```
//!
//! The janitor holds only [`Weak`] handles. It never keeps a container
//! alive, and a disposed container is released on the next pass.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::clock::{Clock, SharedClock};
use crate::error::{LapseError, Result};
use crate::metrics::{spans, CounterSnapshot, SweepCounters};
use crate::schedule::{Scheduler, TaskHandle};

/// What a container did during one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Values physically removed.
    pub expired: usize,
    /// Distinct keys that listeners were notified about.
    pub keys: usize,
    /// Listener invocations that panicked.
    pub listener_panics: usize,
}

/// A container the janitor can sweep.
pub trait Sweep: Send + Sync {
    /// Name used in logs.
    fn label(&self) -> &str;

    /// Remove every entry whose deadline is at or before `now` and notify
    /// listeners. Listeners run after the container lock is released.
    fn sweep(&self, now: Instant) -> SweepReport;

    /// Whether the container was disposed and should no longer be swept.
    fn is_disposed(&self) -> bool;
}

/// Totals for one janitor pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JanitorPass {
    /// Containers swept.
    pub containers: usize,
    /// Values removed across all containers.
    pub expired: usize,
    /// Containers released because they were dropped or disposed.
    pub released: usize,
    /// Listener invocations that panicked.
    pub listener_panics: usize,
}

/// Sweeps every tracked container on demand or from a host schedule.
pub struct Janitor {
    clock: SharedClock,
    tracked: Mutex<Vec<Weak<dyn Sweep>>>,
    counters: SweepCounters,
}

impl Janitor {
    /// Create a janitor reading time from `clock`.
    pub fn new<C: Clock + 'static>(clock: C) -> Self {
        Self::with_clock(Arc::new(clock))
    }

    /// Create a janitor around an already shared clock.
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            clock,
            tracked: Mutex::new(Vec::new()),
            counters: SweepCounters::new(),
        }
    }

    /// The clock shared with every container built against this janitor.
    #[must_use]
    pub fn clock(&self) -> SharedClock {
        Arc::clone(&self.clock)
    }

    /// Current instant according to the janitor's clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Start tracking a container. Only a weak handle is kept.
    pub fn track(&self, container: Weak<dyn Sweep>) {
        self.tracked.lock().push(container);
    }

    /// Number of tracked containers that are still alive and not disposed.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.tracked
            .lock()
            .iter()
            .filter(|handle| handle.upgrade().is_some_and(|c| !c.is_disposed()))
            .count()
    }

    /// Run one pass over every tracked container.
    pub fn sweep_now(&self) -> JanitorPass {
        let _span = tracing::debug_span!(spans::JANITOR_PASS).entered();
        let _timer = self.counters.time_pass();
        let now = self.clock.now();

        // Copy the handles so sweeps (and the listeners they run) may create
        // and track new containers without deadlocking on the registry.
        let handles: Vec<Weak<dyn Sweep>> = self.tracked.lock().clone();

        let mut pass = JanitorPass::default();
        for handle in &handles {
            let Some(container) = handle.upgrade() else {
                continue;
            };
            if container.is_disposed() {
                continue;
            }
            let report = container.sweep(now);
            pass.containers += 1;
            pass.expired += report.expired;
            pass.listener_panics += report.listener_panics;
            if report.expired > 0 {
                debug!(
                    container = %container.label(),
                    expired = report.expired,
                    keys = report.keys,
                    "Swept container"
                );
            }
        }

        {
            let mut tracked = self.tracked.lock();
            let before = tracked.len();
            tracked.retain(|handle| handle.upgrade().is_some_and(|c| !c.is_disposed()));
            pass.released = before - tracked.len();
        }

        self.counters.passes.fetch_add(1, Ordering::Relaxed);
        self.counters
            .containers_swept
            .fetch_add(pass.containers as u64, Ordering::Relaxed);
        self.counters
            .entries_expired
            .fetch_add(pass.expired as u64, Ordering::Relaxed);
        self.counters
            .containers_released
            .fetch_add(pass.released as u64, Ordering::Relaxed);
        self.counters
            .listener_panics
            .fetch_add(pass.listener_panics as u64, Ordering::Relaxed);

        debug!(
            containers = pass.containers,
            expired = pass.expired,
            released = pass.released,
            "Janitor pass complete"
        );
        pass
    }

    /// Snapshot of the janitor's counters.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Drive this janitor from a host scheduler every `interval` ticks.
    ///
    /// The scheduled task holds a weak reference; once the janitor is
    /// dropped the task does nothing.
    ///
    /// # Errors
    /// Returns [`LapseError::InvalidInterval`] when `interval` is zero.
    pub fn attach(
        self: &Arc<Self>,
        scheduler: &dyn Scheduler,
        start_delay: u64,
        interval: u64,
    ) -> Result<TaskHandle> {
        if interval == 0 {
            return Err(LapseError::InvalidInterval { what: "janitor sweep" });
        }
        let janitor = Arc::downgrade(self);
        let handle = scheduler.schedule_repeating(
            start_delay,
            interval,
            Box::new(move || {
                if let Some(janitor) = janitor.upgrade() {
                    janitor.sweep_now();
                }
            }),
        );
        info!(task = handle.id(), start_delay, interval, "Janitor attached to scheduler");
        Ok(handle)
    }
}
