//! Decaying list.
//!
//! An element lives for one `window` after it was last added or touched.
//! Adding an element equal to one already present refreshes that element
//! instead of storing a duplicate, so anything re-added more often than the
//! window never decays.
//!
//! ```text
//!   add("x")       add("x")       add("x")                    swept
//!      │──window──▶   │──window──▶   │──────────window──────────▶│
//!      ▲ created      ▲ refreshed    ▲ refreshed (last touch)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Lifespan, TimeUnit};
use crate::entry::TimedEntry;
use crate::error::{LapseError, Result};
use crate::janitor::Janitor;

use super::Shell;
use super::list::ListState;

/// A list of distinct elements, each forgotten once untouched for a window.
pub struct DecayList<V> {
    shell: Arc<Shell<ListState<V>>>,
    window: Duration,
}

impl<V> Clone for DecayList<V> {
    fn clone(&self) -> Self {
        Self {
            shell: Arc::clone(&self.shell),
            window: self.window,
        }
    }
}

impl<V> DecayList<V>
where
    V: PartialEq + Clone + Send + 'static,
{
    /// Create a list whose elements decay after `window` without a touch.
    ///
    /// # Errors
    /// Returns [`LapseError::InvalidLifespan`] for a zero window.
    pub fn new(janitor: &Janitor, window: Duration) -> Result<Self> {
        Self::labelled(janitor, "decay-list", window)
    }

    /// Create a list from a window expressed as `amount` of `unit`.
    ///
    /// # Errors
    /// Returns [`LapseError::InvalidLifespan`] when `amount` is not positive.
    pub fn with_window(janitor: &Janitor, amount: i64, unit: TimeUnit) -> Result<Self> {
        let window = Lifespan::required(amount, unit)?;
        Self::new(janitor, window)
    }

    /// Like [`DecayList::new`], with a name used in logs.
    ///
    /// # Errors
    /// Returns [`LapseError::InvalidLifespan`] for a zero window.
    pub fn labelled(janitor: &Janitor, label: impl Into<String>, window: Duration) -> Result<Self> {
        if window.is_zero() {
            return Err(LapseError::InvalidLifespan {
                amount: 0,
                unit: TimeUnit::Milliseconds,
            });
        }
        let lifespan = Lifespan::Finite(window);
        Ok(Self {
            shell: Shell::register(janitor, label.into(), lifespan, ListState::new()),
            window,
        })
    }

    /// Add `value`, or refresh the equal element already present.
    ///
    /// Returns `true` when a new element was stored.
    pub fn add(&self, value: V) -> bool {
        let lifespan = Lifespan::Finite(self.window);
        self.shell
            .with(|state, now| {
                let existing = state
                    .entries
                    .iter_mut()
                    .find(|e| !e.is_expired(now) && *e.value() == value);
                match existing {
                    Some(entry) => {
                        entry.rearm(now);
                        false
                    }
                    None => {
                        state.entries.push(TimedEntry::new(value, lifespan, now));
                        true
                    }
                }
            })
            .unwrap_or(false)
    }

    /// Refresh `value` without adding it. Returns `false` when it is absent.
    pub fn touch(&self, value: &V) -> bool {
        self.shell
            .with(|state, now| {
                state
                    .entries
                    .iter_mut()
                    .find(|e| !e.is_expired(now) && e.value() == value)
                    .map(|entry| entry.rearm(now))
                    .is_some()
            })
            .unwrap_or(false)
    }

    /// Whether `value` is present and has not decayed.
    pub fn contains(&self, value: &V) -> bool {
        self.shell
            .with(|state, now| state.live(now).any(|e| e.value() == value))
            .unwrap_or(false)
    }

    /// Time before `value` decays unless touched again.
    pub fn time_left(&self, value: &V) -> Option<Duration> {
        self.shell
            .with(|state, now| {
                state
                    .live(now)
                    .find(|e| e.value() == value)
                    .and_then(|e| e.remaining(now))
            })
            .flatten()
    }

    /// When `value` was last added or touched.
    pub fn last_touched(&self, value: &V) -> Option<Instant> {
        self.shell
            .with(|state, now| {
                state
                    .live(now)
                    .find(|e| e.value() == value)
                    .and_then(|e| e.expires_at().instant())
                    .and_then(|at| at.checked_sub(self.window))
            })
            .flatten()
    }

    /// Remove `value`. Fires no listener.
    pub fn remove(&self, value: &V) -> bool {
        self.shell
            .with(|state, now| {
                let before = state.entries.len();
                state
                    .entries
                    .retain(|e| e.is_expired(now) || e.value() != value);
                state.entries.len() != before
            })
            .unwrap_or(false)
    }

    /// Number of elements that have not decayed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shell
            .with(|state, now| state.live(now).count())
            .unwrap_or(0)
    }

    /// Whether every element has decayed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of elements that have not decayed, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<V> {
        self.shell
            .with(|state, now| state.live(now).map(|e| e.value().clone()).collect())
            .unwrap_or_default()
    }

    /// Register a listener called with the elements that decayed in one sweep.
    pub fn on_lifespan_end<F>(&self, listener: F)
    where
        F: Fn(&[V]) + Send + Sync + 'static,
    {
        self.shell
            .with(|state, _| state.listeners.subscribe(move |_, values| listener(values)));
    }

    /// The decay window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Name used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        self.shell.label()
    }

    /// Drop every element and listener. Returns `false` if already disposed.
    pub fn dispose(&self) -> bool {
        self.shell.dispose()
    }

    /// Whether [`DecayList::dispose`] was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shell.disposed()
    }
}
