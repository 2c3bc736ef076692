//! Timed containers.
//!
//! Every container in this module is a cheap, cloneable handle around one
//! shared [`Shell`]: a label, the janitor's clock, a default lifespan, a
//! disposed flag, and a single mutex guarding the backing store together
//! with its lifespan-end listeners.
//!
//! | container          | backing                         | sweep cost            |
//! |--------------------|---------------------------------|-----------------------|
//! | [`TimedMap`]       | `HashMap` + deadline index      | due entries only      |
//! | [`TimedSet`]       | `TimedMap<T, ()>`               | due entries only      |
//! | [`TimedList`]      | `Vec` in insertion order        | full scan             |
//! | [`TimedMultimap`]  | `HashMap<K, Vec<_>>`            | full scan             |
//! | [`DecayList`]      | `Vec`, deadlines re-armed       | full scan             |
//!
//! Reads never return an expired entry, whether or not the janitor has run.
//! Explicit removal only ever touches live entries; an entry whose lifespan
//! has ended is left for the sweep, which reports it to listeners exactly
//! once.

pub mod decay;
mod index;
pub mod list;
pub mod map;
pub mod multimap;
pub mod set;

pub use decay::DecayList;
pub use list::TimedList;
pub use map::TimedMap;
pub use multimap::{TimedMultimap, WeakTimedMultimap};
pub use set::TimedSet;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::trace;

use crate::clock::{Lifespan, SharedClock};
use crate::janitor::{Janitor, Sweep, SweepReport};
use crate::metrics::spans;
use crate::subscriber::{self, ExpiryListener};

/// Storage behind a container's lock.
pub(crate) trait Backing: Send + 'static {
    /// Key reported to listeners.
    type Key;
    /// Value reported to listeners.
    type Value;

    /// Physically remove everything whose deadline is at or before `now`,
    /// grouped by key.
    fn take_expired(&mut self, now: Instant) -> Vec<(Self::Key, Vec<Self::Value>)>;

    /// Copy of the registered listeners.
    fn listeners(&self) -> Vec<ExpiryListener<Self::Key, Self::Value>>;

    /// Drop all entries and listeners without notifying anyone.
    fn reset(&mut self);
}

/// Shared state of one container.
pub(crate) struct Shell<B> {
    label: String,
    clock: SharedClock,
    default_lifespan: Lifespan,
    disposed: AtomicBool,
    state: Mutex<B>,
}

impl<B: Backing> Shell<B> {
    /// Build a shell and start tracking it with `janitor`.
    pub(crate) fn register(
        janitor: &Janitor,
        label: String,
        default_lifespan: Lifespan,
        backing: B,
    ) -> Arc<Self> {
        let shell = Arc::new(Self {
            label,
            clock: janitor.clock(),
            default_lifespan,
            disposed: AtomicBool::new(false),
            state: Mutex::new(backing),
        });
        let weak: Weak<dyn Sweep> = Arc::downgrade(&shell) as Weak<dyn Sweep>;
        janitor.track(weak);
        trace!(container = %shell.label, "Container registered");
        shell
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn default_lifespan(&self) -> Lifespan {
        self.default_lifespan
    }

    pub(crate) fn disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Run `f` under the lock with the current instant, unless disposed.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut B, Instant) -> R) -> Option<R> {
        if self.disposed() {
            return None;
        }
        let now = self.clock.now();
        let mut state = self.state.lock();
        // `dispose` flips the flag while holding the lock.
        if self.disposed() {
            return None;
        }
        Some(f(&mut state, now))
    }

    /// Dispose: drop every entry and listener. Returns `false` if already disposed.
    pub(crate) fn dispose(&self) -> bool {
        let mut state = self.state.lock();
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        state.reset();
        trace!(container = %self.label, "Container disposed");
        true
    }
}

impl<B: Backing> Sweep for Shell<B> {
    fn label(&self) -> &str {
        &self.label
    }

    fn sweep(&self, now: Instant) -> SweepReport {
        let _span = tracing::trace_span!(spans::CONTAINER_SWEEP, container = %self.label).entered();

        let (batches, listeners) = {
            let mut state = self.state.lock();
            if self.disposed() {
                return SweepReport::default();
            }
            let batches = state.take_expired(now);
            if batches.is_empty() {
                return SweepReport::default();
            }
            (batches, state.listeners())
        };

        let expired = batches.iter().map(|(_, values)| values.len()).sum();
        let listener_panics = subscriber::notify(&self.label, &listeners, &batches);
        SweepReport {
            expired,
            keys: batches.len(),
            listener_panics,
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed()
    }
}
