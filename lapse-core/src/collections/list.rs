//! Timed list in insertion order.

use std::sync::Arc;
use std::time::Instant;

use crate::clock::Lifespan;
use crate::entry::TimedEntry;
use crate::janitor::Janitor;
use crate::subscriber::{ExpiryListener, ExpiryRegistry};

use super::{Backing, Shell};

pub(crate) struct ListState<V> {
    pub(super) entries: Vec<TimedEntry<V>>,
    pub(super) listeners: ExpiryRegistry<(), V>,
}

impl<V> ListState<V> {
    pub(super) fn new() -> Self {
        Self {
            entries: Vec::new(),
            listeners: ExpiryRegistry::new(),
        }
    }

    pub(super) fn live(&self, now: Instant) -> impl Iterator<Item = &TimedEntry<V>> {
        self.entries.iter().filter(move |entry| !entry.is_expired(now))
    }

    /// Position in `entries` of the `index`-th live entry.
    fn slot_of(&self, index: usize, now: Instant) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_expired(now))
            .nth(index)
            .map(|(slot, _)| slot)
    }
}

impl<V: Send + 'static> Backing for ListState<V> {
    type Key = ();
    type Value = V;

    fn take_expired(&mut self, now: Instant) -> Vec<((), Vec<V>)> {
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|entry| entry.is_expired(now));
        self.entries = kept;
        if expired.is_empty() {
            return Vec::new();
        }
        vec![((), expired.into_iter().map(TimedEntry::into_value).collect())]
    }

    fn listeners(&self) -> Vec<ExpiryListener<(), V>> {
        self.listeners.snapshot()
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.listeners.clear();
    }
}

/// A list whose elements disappear once their lifespan ends.
///
/// Duplicates are allowed; each push has its own deadline. Indices refer to
/// live elements only, so they shift as earlier elements expire.
pub struct TimedList<V> {
    shell: Arc<Shell<ListState<V>>>,
}

impl<V> Clone for TimedList<V> {
    fn clone(&self) -> Self {
        Self {
            shell: Arc::clone(&self.shell),
        }
    }
}

impl<V> TimedList<V>
where
    V: Clone + Send + 'static,
{
    /// Create a list swept by `janitor`.
    #[must_use]
    pub fn new(janitor: &Janitor, default_lifespan: Lifespan) -> Self {
        Self::labelled(janitor, "timed-list", default_lifespan)
    }

    /// Like [`TimedList::new`], with a name used in logs.
    #[must_use]
    pub fn labelled(janitor: &Janitor, label: impl Into<String>, default_lifespan: Lifespan) -> Self {
        Self {
            shell: Shell::register(janitor, label.into(), default_lifespan, ListState::new()),
        }
    }

    /// Append with the default lifespan. Returns `false` once disposed.
    pub fn push(&self, value: V) -> bool {
        self.push_for(value, self.shell.default_lifespan())
    }

    /// Append with an explicit lifespan. Returns `false` once disposed.
    pub fn push_for(&self, value: V, lifespan: Lifespan) -> bool {
        self.shell
            .with(|state, now| state.entries.push(TimedEntry::new(value, lifespan, now)))
            .is_some()
    }

    /// The `index`-th live element.
    pub fn get(&self, index: usize) -> Option<V> {
        self.shell
            .with(|state, now| state.live(now).nth(index).map(|e| e.value().clone()))
            .flatten()
    }

    /// Remove the `index`-th live element. Fires no listener.
    pub fn remove_at(&self, index: usize) -> Option<V> {
        self.shell
            .with(|state, now| {
                let slot = state.slot_of(index, now)?;
                Some(state.entries.remove(slot).into_value())
            })
            .flatten()
    }

    /// Number of live elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shell
            .with(|state, now| state.live(now).count())
            .unwrap_or(0)
    }

    /// Whether there is no live element.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of live elements in insertion order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<V> {
        self.shell
            .with(|state, now| state.live(now).map(|e| e.value().clone()).collect())
            .unwrap_or_default()
    }

    /// Keep only live elements for which `keep` returns `true`.
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&V) -> bool,
    {
        self.shell.with(|state, now| {
            state
                .entries
                .retain(|entry| entry.is_expired(now) || keep(entry.value()));
        });
    }

    /// Remove every live element. Fires no listener.
    pub fn clear(&self) {
        self.retain(|_| false);
    }

    /// Register a listener called with the elements that expired in one sweep.
    pub fn on_lifespan_end<F>(&self, listener: F)
    where
        F: Fn(&[V]) + Send + Sync + 'static,
    {
        self.shell
            .with(|state, _| state.listeners.subscribe(move |_, values| listener(values)));
    }

    /// Lifespan used by [`TimedList::push`].
    #[must_use]
    pub fn default_lifespan(&self) -> Lifespan {
        self.shell.default_lifespan()
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

    /// Whether [`TimedList::dispose`] was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shell.disposed()
    }
}

impl<V> TimedList<V>
where
    V: PartialEq + Clone + Send + 'static,
{
    /// Whether an equal live element is present.
    pub fn contains(&self, value: &V) -> bool {
        self.shell
            .with(|state, now| state.live(now).any(|e| e.value() == value))
            .unwrap_or(false)
    }

    /// Remove the first equal live element. Fires no listener.
    pub fn remove(&self, value: &V) -> bool {
        self.shell
            .with(|state, now| {
                let slot = state
                    .entries
                    .iter()
                    .position(|e| !e.is_expired(now) && e.value() == value);
                slot.map(|slot| state.entries.remove(slot)).is_some()
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, TimeUnit};
    use parking_lot::Mutex;

    fn setup() -> (ManualClock, Janitor) {
        let clock = ManualClock::new();
        let janitor = Janitor::new(clock.clone());
        (clock, janitor)
    }

    #[test]
    fn keeps_insertion_order_and_duplicates() {
        let (_, janitor) = setup();
        let list = TimedList::new(&janitor, Lifespan::Forever);
        list.push("b");
        list.push("a");
        list.push("b");

        assert_eq!(list.to_vec(), vec!["b", "a", "b"]);
        assert!(list.remove(&"b"));
        assert_eq!(list.to_vec(), vec!["a", "b"]);
    }

    #[test]
    fn indices_skip_expired_elements() {
        let (clock, janitor) = setup();
        let list = TimedList::new(&janitor, Lifespan::Forever);
        list.push_for(1, Lifespan::of(1, TimeUnit::Seconds));
        list.push(2);
        list.push(3);

        clock.advance_millis(1_000);
        assert_eq!(list.get(0), Some(2));
        assert_eq!(list.remove_at(1), Some(3));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn sweep_batches_expired_elements() {
        let (clock, janitor) = setup();
        let list = TimedList::new(&janitor, Lifespan::of(10, TimeUnit::Ticks));
        let batches = Arc::new(Mutex::new(Vec::new()));
        {
            let batches = Arc::clone(&batches);
            list.on_lifespan_end(move |values: &[char]| batches.lock().push(values.to_vec()));
        }

        list.push('x');
        list.push('y');
        list.push_for('z', Lifespan::Forever);
        clock.advance_ticks(10);
        janitor.sweep_now();
        janitor.sweep_now();

        assert_eq!(*batches.lock(), vec![vec!['x', 'y']]);
        assert_eq!(list.to_vec(), vec!['z']);
    }

    #[test]
    fn explicit_removal_is_silent() {
        let (clock, janitor) = setup();
        let list = TimedList::new(&janitor, Lifespan::of(1, TimeUnit::Seconds));
        let fired = Arc::new(Mutex::new(false));
        {
            let fired = Arc::clone(&fired);
            list.on_lifespan_end(move |_| *fired.lock() = true);
        }

        list.push(5);
        list.clear();
        clock.advance_millis(2_000);
        janitor.sweep_now();

        assert!(!*fired.lock());
    }
}
